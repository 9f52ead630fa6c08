use decisionmaker::processing::monte_carlo::{DEFAULT_SIMULATIONS, DEFAULT_STEPS};
use decisionmaker::{AnalysisConfig, AnalysisError, Result};

/// Text buffers for the settings window. Values are parsed only on Apply, so
/// half-typed numbers never reach the active configuration.
pub struct SettingsDialogState {
    pub simulations: String,
    pub steps: String,
    pub seed: String,
    pub error: String,
}

impl SettingsDialogState {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            simulations: config.simulations.to_string(),
            steps: config.steps.to_string(),
            seed: config.seed.map(|s| s.to_string()).unwrap_or_default(),
            error: String::new(),
        }
    }

    /// Parse the buffers. An empty seed means fresh entropy per run.
    pub fn to_config(&self) -> Result<AnalysisConfig> {
        let simulations = parse_count("Simulations", &self.simulations)?;
        let steps = parse_count("Steps", &self.steps)?;
        let seed = match self.seed.trim() {
            "" => None,
            s => Some(
                s.parse::<u64>()
                    .map_err(|_| AnalysisError::InvalidParameter(format!("Seed '{s}' is not a whole number")))?,
            ),
        };

        let config = AnalysisConfig {
            simulations,
            steps,
            seed,
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_count(label: &str, text: &str) -> Result<usize> {
    text.trim()
        .parse::<usize>()
        .map_err(|_| AnalysisError::InvalidParameter(format!("{label} must be a positive integer, got '{text}'")))
}

/// Show the settings window. Returns `(keep_open, applied)`, where `applied`
/// carries a validated configuration when the user pressed Apply.
pub fn show_settings_dialog(
    ctx: &egui::Context,
    state: &mut SettingsDialogState,
) -> (bool, Option<AnalysisConfig>) {
    let mut open = true;
    let mut applied = None;

    egui::Window::new("Analysis Settings")
        .open(&mut open)
        .collapsible(false)
        .resizable(false)
        .default_width(360.0)
        .show(ctx, |ui| {
            ui.label(egui::RichText::new("Monte Carlo projection").strong().size(15.0));
            ui.add_space(4.0);

            egui::Grid::new("settings_grid")
                .num_columns(2)
                .spacing([10.0, 6.0])
                .show(ui, |ui| {
                    ui.label("Simulations:");
                    ui.add(egui::TextEdit::singleline(&mut state.simulations).desired_width(100.0));
                    ui.end_row();

                    ui.label("Steps ahead:");
                    ui.add(egui::TextEdit::singleline(&mut state.steps).desired_width(100.0));
                    ui.end_row();

                    ui.label("Seed:");
                    ui.add(
                        egui::TextEdit::singleline(&mut state.seed)
                            .hint_text("random")
                            .desired_width(100.0),
                    );
                    ui.end_row();
                });

            ui.add_space(2.0);
            ui.label(egui::RichText::new("Leave the seed empty for a different projection on every run.").weak());

            ui.add_space(8.0);
            ui.horizontal(|ui| {
                if ui
                    .add(egui::Button::new("Apply").min_size(egui::vec2(100.0, 28.0)))
                    .clicked()
                {
                    match state.to_config() {
                        Ok(config) => {
                            state.error.clear();
                            applied = Some(config);
                        }
                        Err(e) => state.error = e.to_string(),
                    }
                }
                if ui
                    .add(egui::Button::new("Defaults").min_size(egui::vec2(100.0, 28.0)))
                    .clicked()
                {
                    state.simulations = DEFAULT_SIMULATIONS.to_string();
                    state.steps = DEFAULT_STEPS.to_string();
                    state.seed.clear();
                    state.error.clear();
                }
            });

            if !state.error.is_empty() {
                ui.add_space(4.0);
                ui.colored_label(egui::Color32::from_rgb(255, 80, 80), &state.error);
            }
        });

    (open, applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_input() {
        let state = SettingsDialogState {
            simulations: " 500 ".into(),
            steps: "3".into(),
            seed: "42".into(),
            error: String::new(),
        };
        let config = state.to_config().unwrap();
        assert_eq!(config.simulations, 500);
        assert_eq!(config.steps, 3);
        assert_eq!(config.seed, Some(42));
    }

    #[test]
    fn empty_seed_means_random() {
        let state = SettingsDialogState::new(&AnalysisConfig::default());
        assert!(state.seed.is_empty());
        assert_eq!(state.to_config().unwrap(), AnalysisConfig::default());
    }

    #[test]
    fn rejects_bad_counts() {
        let mut state = SettingsDialogState::new(&AnalysisConfig::default());
        state.simulations = "0".into();
        assert!(matches!(state.to_config(), Err(AnalysisError::InvalidParameter(_))));

        state.simulations = "-5".into();
        assert!(state.to_config().is_err());

        state.simulations = "10".into();
        state.seed = "abc".into();
        assert!(state.to_config().unwrap_err().to_string().contains("abc"));
    }

    #[test]
    fn rejects_oversized_runs() {
        let mut state = SettingsDialogState::new(&AnalysisConfig::default());
        state.simulations = usize::MAX.to_string();
        state.steps = "2".into();
        assert!(matches!(state.to_config(), Err(AnalysisError::InvalidParameter(_))));
    }
}
