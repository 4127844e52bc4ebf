use crate::config::Config;
use crate::transport::Credential;

/// A cyclable list of named options with one selected.
#[derive(Debug, Clone)]
pub struct Choice {
    options: Vec<String>,
    selected: usize,
}

impl Choice {
    /// Builds a choice over `options`, selecting `initial` if present. An
    /// empty list falls back to `initial` as the only option.
    pub fn new(options: Vec<String>, initial: &str) -> Self {
        let mut options = options;
        if options.is_empty() {
            options.push(initial.to_string());
        }
        let selected = options.iter().position(|o| o == initial).unwrap_or(0);
        Self { options, selected }
    }

    pub fn current(&self) -> &str {
        &self.options[self.selected]
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn cycle(&mut self) {
        self.selected = (self.selected + 1) % self.options.len();
    }

    /// Select by 1-based position.
    pub fn select_position(&mut self, position: usize) -> bool {
        if position == 0 || position > self.options.len() {
            return false;
        }
        self.selected = position - 1;
        true
    }

    /// Select by exact name, adding it when unknown.
    pub fn select_name(&mut self, name: &str) {
        match self.options.iter().position(|o| o == name) {
            Some(index) => self.selected = index,
            None => {
                self.options.push(name.to_string());
                self.selected = self.options.len() - 1;
            }
        }
    }
}

/// Per-session inputs to every chat request. Lives in memory only.
#[derive(Debug, Clone)]
pub struct Settings {
    credential: Option<Credential>,
    pub model: Choice,
    pub developer_prompt: Choice,
}

impl Settings {
    pub fn from_config(config: &Config) -> Self {
        let default_prompt = config
            .developer_prompts
            .first()
            .cloned()
            .unwrap_or_else(|| crate::config::DEFAULT_DEVELOPER_PROMPT.to_string());

        Self {
            credential: None,
            model: Choice::new(config.models.clone(), &config.default_model),
            developer_prompt: Choice::new(config.developer_prompts.clone(), &default_prompt),
        }
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    /// Replace the credential from raw field input. Blank clears it.
    pub fn set_credential(&mut self, raw: &str) {
        self.credential = Credential::new(raw);
    }
}
