use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Single-line text field edited at its end.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
    pub label: &'static str,
    pub value: String,
    pub masked: bool,
    pub error: Option<String>,
}

impl TextInput {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            ..Self::default()
        }
    }

    pub fn masked(label: &'static str) -> Self {
        Self {
            masked: true,
            ..Self::new(label)
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// Applies an editing key. Returns whether the key was consumed.
    pub fn handle_key(&mut self, key: &KeyEvent) -> bool {
        match key.code {
            KeyCode::Char(c) if !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => {
                self.value.push(c);
                self.error = None;
                true
            }
            KeyCode::Backspace => {
                self.value.pop();
                self.error = None;
                true
            }
            _ => false,
        }
    }

    /// Text as it should appear on screen.
    pub fn display(&self) -> String {
        if self.masked {
            "*".repeat(self.value.chars().count())
        } else {
            self.value.clone()
        }
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.error = None;
    }
}

/// Username and password pair used by the login and registration views.
#[derive(Debug, Clone)]
pub struct CredentialsForm {
    pub username: TextInput,
    pub password: TextInput,
    pub focus: CredentialsField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialsField {
    Username,
    Password,
}

impl Default for CredentialsForm {
    fn default() -> Self {
        Self {
            username: TextInput::new("Username"),
            password: TextInput::masked("Password"),
            focus: CredentialsField::Username,
        }
    }
}

impl CredentialsForm {
    pub fn focused_mut(&mut self) -> &mut TextInput {
        match self.focus {
            CredentialsField::Username => &mut self.username,
            CredentialsField::Password => &mut self.password,
        }
    }

    pub fn next_field(&mut self) {
        self.focus = match self.focus {
            CredentialsField::Username => CredentialsField::Password,
            CredentialsField::Password => CredentialsField::Username,
        };
    }

    pub fn clear_errors(&mut self) {
        self.username.error = None;
        self.password.error = None;
    }
}
