use std::fmt;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Single-line formatter: optional wall clock time, level, module path, function name,
/// message and any extra fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionFormatter {
    timestamps: bool,
}

impl FunctionFormatter {
    pub fn with_timestamps(mut self, timestamps: bool) -> Self {
        self.timestamps = timestamps;
        self
    }
}

#[derive(Default)]
struct EventVisitor {
    message: Option<String>,
    function: Option<String>,
    other_fields: Vec<(String, String)>,
}

impl EventVisitor {
    fn record(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            "function" => self.function = Some(value),
            name => self.other_fields.push((name.to_string(), value)),
        }
    }
}

fn unquote(value: String) -> String {
    match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => inner.to_string(),
        None => value,
    }
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record(field, unquote(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.record(field, value.to_string());
    }
}

impl<S, N> FormatEvent<S, N> for FunctionFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        let module_path = metadata.module_path().unwrap_or_else(|| metadata.target());

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        if self.timestamps {
            write!(writer, "{} ", chrono::Local::now().format("%H:%M:%S%.3f"))?;
        }
        write!(writer, "{} ", metadata.level())?;

        // log_* macros report the full function path, which already includes the module.
        match visitor.function {
            Some(function) if function.starts_with(module_path) => write!(writer, "{function}")?,
            Some(function) => write!(writer, "{module_path}::{function}")?,
            None => write!(writer, "{module_path}")?,
        }

        if let Some(span) = ctx.lookup_current() {
            let mut names: Vec<&str> = span.scope().map(|span| span.name()).collect();
            names.reverse();
            write!(writer, " [{}]", names.join("::"))?;
        }

        write!(writer, ":")?;
        if let Some(message) = visitor.message {
            write!(writer, " {message}")?;
        }
        for (name, value) in visitor.other_fields {
            write!(writer, " {name}={value}")?;
        }
        writeln!(writer)
    }
}

/// Initialize tracing with the custom formatter.
///
/// `RUST_LOG` wins when set; otherwise `verbosity` picks info, debug or trace for this crate.
pub fn init_logging(verbosity: u8, timestamps: bool) {
    use tracing_subscriber::EnvFilter;

    let fallback = match verbosity {
        0 => "info",
        1 => "info,lulasafe=debug",
        _ => "debug,lulasafe=trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .event_format(FunctionFormatter::default().with_timestamps(timestamps))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tracing::subscriber::DefaultGuard;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct BufferWriter {
        buffer: Arc<Mutex<String>>,
    }

    struct BufferGuard {
        buffer: Arc<Mutex<String>>,
    }

    impl<'a> MakeWriter<'a> for BufferWriter {
        type Writer = BufferGuard;

        fn make_writer(&'a self) -> Self::Writer {
            BufferGuard {
                buffer: Arc::clone(&self.buffer),
            }
        }
    }

    impl Write for BufferGuard {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let mut lock = self.buffer.lock().unwrap();
            lock.push_str(&String::from_utf8_lossy(buf));
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl BufferWriter {
        fn contents(&self) -> String {
            self.buffer.lock().unwrap().clone()
        }
    }

    fn install_test_subscriber() -> (BufferWriter, DefaultGuard) {
        let writer = BufferWriter::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(writer.clone())
            .event_format(FunctionFormatter::default())
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (writer, guard)
    }

    #[test]
    fn function_name_includes_module_and_level() {
        let (writer, guard) = install_test_subscriber();
        crate::log_info!("sample message");
        drop(guard);

        let output = writer.contents();
        assert!(output.starts_with("INFO "), "output was: {output:?}");
        assert!(
            output.contains("lulasafe::logging::tests::function_name_includes_module_and_level:"),
            "output missing module/function: {output:?}"
        );
        assert!(output.contains("sample message"), "output missing message: {output:?}");
    }

    #[test]
    fn extra_fields_follow_the_message() {
        let (writer, guard) = install_test_subscriber();
        crate::log_warn!(session_id = "s-1", "session expiring");
        drop(guard);

        let output = writer.contents();
        assert!(output.contains("WARN"), "output was: {output:?}");
        assert!(
            output.contains("session expiring session_id=s-1"),
            "output was: {output:?}"
        );
    }

    #[test]
    fn span_names_are_listed() {
        let (writer, guard) = install_test_subscriber();
        {
            let span = tracing::info_span!("assess");
            let _entered = span.enter();
            tracing::info!("inside");
        }
        drop(guard);

        let output = writer.contents();
        assert!(output.contains(" [assess]: inside"), "output was: {output:?}");
    }
}

#[macro_export]
#[doc(hidden)]
macro_rules! __log_function_path {
    () => {{
        fn __type_name_of<T>(_value: T) -> &'static str {
            std::any::type_name::<T>()
        }
        let name = __type_name_of(|| {});
        match name.find("::{{closure") {
            Some(index) => &name[..index],
            None => name,
        }
    }};
}

#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {{
        tracing::trace!(function = %$crate::__log_function_path!(), $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        tracing::debug!(function = %$crate::__log_function_path!(), $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {{
        tracing::info!(function = %$crate::__log_function_path!(), $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {{
        tracing::warn!(function = %$crate::__log_function_path!(), $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {{
        tracing::error!(function = %$crate::__log_function_path!(), $($arg)*);
    }};
}
