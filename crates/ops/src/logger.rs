//! The embedder-facing logging hook spec.md's ambient stack calls for: a
//! `RequestLogger` a `HostMethodTable` implementation can hold onto and call
//! around its own work, independent of the `tracing::debug!` call log
//! `ligature_executor::execute_request` already emits for every scheduled
//! call. Its only implementation here forwards into `tracing`, the same
//! crate every other component in this workspace logs through.

/// One call's worth of logging an embedder's `HostMethodTable` may want to
/// do beyond what the executor already emits at `debug` level -- e.g. a
/// service recording its own request metrics alongside the call log.
pub trait RequestLogger: Send + Sync {
    fn log_call(&self, class_name: &str, funcid: u32, argc: usize, result_var: &str);
    fn log_error(&self, class_name: &str, funcid: u32, message: &str);
}

/// The default `RequestLogger`: every call and error forwarded straight
/// into `tracing`, at `info` and `warn` respectively.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl RequestLogger for TracingLogger {
    fn log_call(&self, class_name: &str, funcid: u32, argc: usize, result_var: &str) {
        tracing::info!(class = class_name, funcid, argc, result_var, "request call");
    }

    fn log_error(&self, class_name: &str, funcid: u32, message: &str) {
        tracing::warn!(class = class_name, funcid, message, "request call failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracing_logger_does_not_panic_without_a_subscriber_installed() {
        let logger = TracingLogger;
        logger.log_call("Doc", 1, 2, "result");
        logger.log_error("Doc", 1, "boom");
    }
}
