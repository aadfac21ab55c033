// Macros file - tracing macros are imported within the macro definitions

/// Standardized logging macros so every component emits the same field names
/// (`operation`, `request_id`, `client_id`, `component`) for the log pipeline.

// ============================================================================
// API Operation Logging Macros
// ============================================================================

/// Log the start of an API operation with consistent fields
#[macro_export]
macro_rules! log_api_start {
    ($operation:expr, request_id = $request_id:expr, client_id = $client_id:expr) => {
        tracing::debug!(
            operation = $operation,
            request_id = %$request_id,
            client_id = %$client_id,
            "API operation started"
        );
    };
    ($operation:expr) => {
        tracing::debug!(
            operation = $operation,
            "API operation started"
        );
    };
}

/// Log successful completion of an API operation
#[macro_export]
macro_rules! log_api_success {
    ($operation:expr, request_id = $request_id:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            request_id = %$request_id,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, count = $count:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            count = $count,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            "API operation completed: {}", $msg
        );
    };
}

/// Log API warnings with context
#[macro_export]
macro_rules! log_api_warn {
    ($operation:expr, client_id = $client_id:expr, $msg:expr) => {
        tracing::warn!(
            operation = $operation,
            client_id = %$client_id,
            "API operation warning: {}", $msg
        );
    };
    ($operation:expr, $msg:expr) => {
        tracing::warn!(
            operation = $operation,
            "API operation warning: {}", $msg
        );
    };
}

// ============================================================================
// Service Layer Logging Macros
// ============================================================================

/// Log service operation start with context
#[macro_export]
macro_rules! log_service_start {
    ($service:expr, $operation:expr, request_id = $request_id:expr, client_id = $client_id:expr) => {
        tracing::info!(
            service = $service,
            operation = $operation,
            request_id = %$request_id,
            client_id = %$client_id,
            "Service operation started"
        );
    };
    ($service:expr, $operation:expr) => {
        tracing::info!(
            service = $service,
            operation = $operation,
            "Service operation started"
        );
    };
}

/// Log service operation success
#[macro_export]
macro_rules! log_service_success {
    ($service:expr, $operation:expr, request_id = $request_id:expr, from_cache = $from_cache:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            service = $service,
            operation = $operation,
            request_id = %$request_id,
            from_cache = $from_cache,
            duration_ms = $duration,
            "Service operation completed successfully"
        );
    };
    ($service:expr, $operation:expr, $msg:expr) => {
        tracing::info!(
            service = $service,
            operation = $operation,
            "Service operation completed: {}", $msg
        );
    };
}

/// Log service operation errors
#[macro_export]
macro_rules! log_service_error {
    ($service:expr, $operation:expr, request_id = $request_id:expr, error = $error:expr) => {
        tracing::error!(
            service = $service,
            operation = $operation,
            request_id = %$request_id,
            error = %$error,
            "Service operation failed"
        );
    };
    ($service:expr, $operation:expr, error = $error:expr) => {
        tracing::error!(
            service = $service,
            operation = $operation,
            error = %$error,
            "Service operation failed"
        );
    };
}

/// Log service warnings
#[macro_export]
macro_rules! log_service_warn {
    ($service:expr, $operation:expr, request_id = $request_id:expr, $msg:expr) => {
        tracing::warn!(
            service = $service,
            operation = $operation,
            request_id = %$request_id,
            "Service warning: {}",
            $msg
        );
    };
    ($service:expr, $operation:expr, $msg:expr) => {
        tracing::warn!(
            service = $service,
            operation = $operation,
            "Service warning: {}",
            $msg
        );
    };
}

// ============================================================================
// Cache Logging Macros
// ============================================================================

/// Log quiz cache activity
#[macro_export]
macro_rules! log_cache_operation {
    (miss, key = $key:expr) => {
        tracing::debug!(component = "quiz_cache", operation = "get", key = %$key, "Cache miss");
    };
    (hit, key = $key:expr, usage_count = $usage:expr) => {
        tracing::debug!(
            component = "quiz_cache",
            operation = "get",
            key = %$key,
            usage_count = $usage,
            "Cache hit"
        );
    };
    (expired, key = $key:expr) => {
        tracing::debug!(component = "quiz_cache", operation = "get", key = %$key, "Cache entry expired");
    };
    (stored, key = $key:expr, size = $size:expr) => {
        tracing::debug!(
            component = "quiz_cache",
            operation = "put",
            key = %$key,
            cache_size = $size,
            "Cache entry stored"
        );
    };
    (swept, removed = $removed:expr) => {
        tracing::debug!(
            component = "quiz_cache",
            operation = "cleanup",
            removed = $removed,
            "Expired cache entries removed"
        );
    };
    (evicted, key = $key:expr) => {
        tracing::debug!(component = "quiz_cache", operation = "evict", key = %$key, "Oldest cache entry evicted");
    };
}

// ============================================================================
// Rate Limiter Logging Macros
// ============================================================================

/// Log admission control decisions
#[macro_export]
macro_rules! log_rate_limit {
    (denied, client_id = $client_id:expr, retry_after = $retry:expr) => {
        tracing::warn!(
            component = "rate_limiter",
            client_id = %$client_id,
            retry_after_seconds = $retry,
            "Rate limit exceeded"
        );
    };
    (cleanup, removed = $removed:expr) => {
        tracing::debug!(
            component = "rate_limiter",
            removed = $removed,
            "Stale rate limit windows removed"
        );
    };
}

// ============================================================================
// LLM Service Logging Macros
// ============================================================================

/// Log LLM backend operations with provider context
#[macro_export]
macro_rules! log_llm_operation {
    (start, $operation:expr, provider = $provider:expr, prompt_length = $len:expr) => {
        tracing::info!(
            component = "llm_provider",
            operation = $operation,
            provider = %$provider,
            prompt_length = $len,
            "LLM operation started"
        );
    };
    (success, $operation:expr, provider = $provider:expr, duration_ms = $duration:expr, response_length = $len:expr) => {
        tracing::info!(
            component = "llm_provider",
            operation = $operation,
            provider = %$provider,
            duration_ms = $duration,
            response_length = $len,
            "LLM operation completed successfully"
        );
    };
    (error, $operation:expr, provider = $provider:expr, error = $error:expr) => {
        tracing::error!(
            component = "llm_provider",
            operation = $operation,
            provider = %$provider,
            error = %$error,
            "LLM operation failed"
        );
    };
    (warn, $operation:expr, $msg:expr) => {
        tracing::warn!(
            component = "llm_provider",
            operation = $operation,
            "LLM operation warning: {}", $msg
        );
    };
}

// ============================================================================
// System Event Logging Macros
// ============================================================================

/// Log system startup and shutdown events
#[macro_export]
macro_rules! log_system_event {
    (startup, component = $component:expr, $msg:expr) => {
        tracing::info!(
            event_type = "startup",
            component = $component,
            "System event: {}",
            $msg
        );
    };
    (shutdown, component = $component:expr, $msg:expr) => {
        tracing::info!(
            event_type = "shutdown",
            component = $component,
            "System event: {}",
            $msg
        );
    };
    (config, $msg:expr) => {
        tracing::info!(event_type = "configuration", "System event: {}", $msg);
    };
}

// ============================================================================
// Performance Logging Macros
// ============================================================================

/// Log performance metrics with consistent structure
#[macro_export]
macro_rules! log_performance {
    ($operation:expr, duration_ms = $duration:expr, from_cache = $from_cache:expr) => {
        tracing::debug!(
            event_type = "performance",
            operation = $operation,
            duration_ms = $duration,
            from_cache = $from_cache,
            "Performance metrics"
        );
    };
    ($operation:expr, duration_ms = $duration:expr) => {
        tracing::debug!(
            event_type = "performance",
            operation = $operation,
            duration_ms = $duration,
            "Performance metrics"
        );
    };
}

// ============================================================================
// Validation Logging Macros
// ============================================================================

/// Log validation results consistently
#[macro_export]
macro_rules! log_validation {
    (success, $component:expr, $msg:expr) => {
        tracing::debug!(
            event_type = "validation",
            component = $component,
            result = "success",
            "Validation completed: {}", $msg
        );
    };
    (failure, $component:expr, error = $error:expr) => {
        tracing::warn!(
            event_type = "validation",
            component = $component,
            result = "failure",
            error = %$error,
            "Validation failed"
        );
    };
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    #[test]
    fn test_logging_macros_compile() {
        let request_id = Uuid::new_v4();
        let error = anyhow::anyhow!("test error");

        // Test that all macro variants compile successfully
        log_api_start!("generate_quiz", request_id = request_id, client_id = "127.0.0.1");
        log_api_start!("health");

        log_api_success!("generate_quiz", request_id = request_id, "quiz generated");
        log_api_success!("stats", count = 5, "statistics collected");
        log_api_warn!("generate_quiz", client_id = "10.0.0.1", "rate limit exceeded");

        log_service_start!("quiz_service", "generate", request_id = request_id, client_id = "c");
        log_service_success!("quiz_service", "generate", request_id = request_id, from_cache = true, duration_ms = 3);
        log_service_error!("quiz_service", "generate", request_id = request_id, error = error);
        log_service_warn!("quiz_service", "parse", "unexpected format");

        log_cache_operation!(miss, key = "0123456789abcdef");
        log_cache_operation!(hit, key = "0123456789abcdef", usage_count = 2);
        log_cache_operation!(stored, key = "0123456789abcdef", size = 1);
        log_cache_operation!(swept, removed = 3);

        log_rate_limit!(denied, client_id = "1.2.3.4", retry_after = 12);
        log_rate_limit!(cleanup, removed = 4);

        log_llm_operation!(start, "generate", provider = "openai", prompt_length = 1200);
        log_llm_operation!(success, "generate", provider = "openai", duration_ms = 1500, response_length = 900);
        log_llm_operation!(warn, "generate", "slow response");

        log_system_event!(startup, component = "server", "server starting");
        log_system_event!(config, "configuration loaded successfully");

        log_performance!("generate_quiz", duration_ms = 2500, from_cache = false);
        log_performance!("single_operation", duration_ms = 50);

        log_validation!(success, "quiz_request", "request validated");
        log_validation!(failure, "quiz_request", error = "Topic cannot be empty");
    }
}
