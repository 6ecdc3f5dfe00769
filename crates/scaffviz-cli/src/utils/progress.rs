use indicatif::{ProgressBar, ProgressStyle};
use scaffviz::engine::progress::{Progress, ProgressCallback};
use std::time::Duration;

const SPINNER_TICK: Duration = Duration::from_millis(80);

/// Renders embedding progress as a single spinner line on stderr.
#[derive(Clone)]
pub struct CliProgressHandler {
    spinner: ProgressBar,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        let style = ProgressStyle::with_template("{spinner:.green} {msg}")
            .expect("Failed to create spinner style template");
        Self {
            spinner: ProgressBar::new_spinner().with_style(style),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let spinner = self.spinner.clone();

        Box::new(move |progress: Progress| match progress {
            Progress::PhaseStart { name } => {
                spinner.reset();
                spinner.enable_steady_tick(SPINNER_TICK);
                spinner.set_message(name);
            }
            Progress::PhaseFinish => spinner.finish_with_message("✓ Done"),
            Progress::Cached { identity, columns } => {
                spinner.set_message(format!("Reusing {columns} cached {identity} column(s)"));
            }
            Progress::ColumnWritten { name } => {
                spinner.inc(1);
                spinner.set_message(format!("Wrote column {name}"));
            }
            Progress::Message(msg) => spinner.println(format!("  {msg}")),
        })
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn callback_tracks_phase_and_columns() {
        let handler = CliProgressHandler::new();
        let callback = handler.get_callback();

        callback(Progress::PhaseStart {
            name: "Computing TSNE embedding".to_string(),
        });
        assert_eq!(handler.spinner.message(), "Computing TSNE embedding");
        assert!(!handler.spinner.is_finished());

        callback(Progress::ColumnWritten {
            name: "TSNE_1".to_string(),
        });
        assert_eq!(handler.spinner.message(), "Wrote column TSNE_1");
        assert_eq!(handler.spinner.position(), 1);

        callback(Progress::Cached {
            identity: "PCA".to_string(),
            columns: 2,
        });
        assert_eq!(handler.spinner.message(), "Reusing 2 cached PCA column(s)");

        callback(Progress::PhaseFinish);
        assert!(handler.spinner.is_finished());
        assert_eq!(handler.spinner.message(), "✓ Done");
    }

    #[test]
    fn a_new_phase_restarts_a_finished_spinner() {
        let handler = CliProgressHandler::new();
        let callback = handler.get_callback();

        callback(Progress::PhaseStart {
            name: "first".to_string(),
        });
        callback(Progress::ColumnWritten {
            name: "PCA_1".to_string(),
        });
        callback(Progress::PhaseFinish);
        callback(Progress::PhaseStart {
            name: "second".to_string(),
        });

        assert!(!handler.spinner.is_finished());
        assert_eq!(handler.spinner.position(), 0);
        assert_eq!(handler.spinner.message(), "second");
        callback(Progress::PhaseFinish);
    }

    #[test]
    fn callback_is_usable_from_another_thread() {
        let handler = CliProgressHandler::new();
        let callback = handler.get_callback();

        thread::spawn(move || {
            callback(Progress::PhaseStart {
                name: "Thread Test".to_string(),
            });
            callback(Progress::Message("working".to_string()));
            callback(Progress::PhaseFinish);
        })
        .join()
        .unwrap();

        assert!(handler.spinner.is_finished());
        assert_eq!(handler.spinner.message(), "✓ Done");
    }
}
