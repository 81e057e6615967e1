use log::Level;

/// Narrow logging capability injected into the view and its controller.
pub trait LogSink: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

/// Forwards records to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCrateSink;

impl LogSink for LogCrateSink {
    fn log(&self, level: Level, message: &str) {
        log::log!(target: "circle_video", level, "{message}");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use log::Level;

    use super::LogSink;

    /// Collects records so tests can assert on diagnostics.
    #[derive(Default)]
    pub struct MemorySink {
        pub records: Mutex<Vec<(Level, String)>>,
    }

    impl MemorySink {
        pub fn contains(&self, level: Level, needle: &str) -> bool {
            self.records
                .lock()
                .unwrap()
                .iter()
                .any(|(l, m)| *l == level && m.contains(needle))
        }
    }

    impl LogSink for MemorySink {
        fn log(&self, level: Level, message: &str) {
            self.records.lock().unwrap().push((level, message.to_string()));
        }
    }
}
