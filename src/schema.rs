use serde::Deserialize;
use serenity::all::{CommandOptionType, CreateCommand, CreateCommandOption};

/// Maximum number of choices allowed per option (Discord limit)
const MAX_CHOICES: usize = 25;
/// Maximum length of a command or option name (Discord limit)
const MAX_NAME_LENGTH: usize = 32;
/// Maximum length of a command or option description (Discord limit)
const MAX_DESCRIPTION_LENGTH: usize = 100;
/// Maximum number of options per command (Discord limit)
const MAX_OPTIONS: usize = 25;

/// The parameters a structured command accepts, as declared by its module.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct StructuredSchema {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub options: Vec<SchemaOption>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct SchemaOption {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: OptionKind,
    #[serde(default)]
    pub required: bool,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub min_length: Option<u16>,
    pub max_length: Option<u16>,
    #[serde(default)]
    pub autocomplete: bool,
    #[serde(default)]
    pub choices: Vec<Choice>,
}

/// A choice entry with name and value
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Choice {
    pub name: String,
    pub value: String,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    String,
    Integer,
    Number,
    Boolean,
    User,
    Channel,
    Role,
    Mentionable,
    Attachment,
}
impl From<OptionKind> for CommandOptionType {
    fn from(kind: OptionKind) -> Self {
        match kind {
            OptionKind::String => CommandOptionType::String,
            OptionKind::Integer => CommandOptionType::Integer,
            OptionKind::Number => CommandOptionType::Number,
            OptionKind::Boolean => CommandOptionType::Boolean,
            OptionKind::User => CommandOptionType::User,
            OptionKind::Channel => CommandOptionType::Channel,
            OptionKind::Role => CommandOptionType::Role,
            OptionKind::Mentionable => CommandOptionType::Mentionable,
            OptionKind::Attachment => CommandOptionType::Attachment,
        }
    }
}

impl StructuredSchema {
    /// Checks the limits Discord would otherwise reject at registration time.
    pub fn validate(&self) -> Result<(), String> {
        validate_name("Command", &self.name)?;
        validate_description("Command", &self.name, &self.description)?;
        if self.options.len() > MAX_OPTIONS {
            return Err(format!(
                "Command '{}' has {} options, but Discord allows a maximum of {MAX_OPTIONS}",
                self.name,
                self.options.len()
            ));
        }
        for opt in &self.options {
            validate_name("Option", &opt.name)?;
            validate_description("Option", &opt.name, &opt.description)?;
            // Choices are sent as strings
            if !opt.choices.is_empty() && opt.kind != OptionKind::String {
                return Err(format!(
                    "Option '{}' has choices, but only string options may have them",
                    opt.name
                ));
            }
            if opt.choices.len() > MAX_CHOICES {
                return Err(format!(
                    "Option '{}' has {} choices, but Discord allows a maximum of {}",
                    opt.name,
                    opt.choices.len(),
                    MAX_CHOICES
                ));
            }
        }
        Ok(())
    }

    pub fn to_discord_command(&self) -> CreateCommand {
        let mut cmd = CreateCommand::new(&self.name).description(&self.description);

        for opt in &self.options {
            let mut option = CreateCommandOption::new(opt.kind.into(), &opt.name, &opt.description)
                .required(opt.required);

            if let Some(min_value) = opt.min_value {
                option = option.min_number_value(min_value);
            }
            if let Some(max_value) = opt.max_value {
                option = option.max_number_value(max_value);
            }
            if let Some(min_length) = opt.min_length {
                option = option.min_length(min_length);
            }
            if let Some(max_length) = opt.max_length {
                option = option.max_length(max_length);
            }
            if opt.autocomplete {
                option = option.set_autocomplete(true);
            }
            for choice in &opt.choices {
                option = option.add_string_choice(&choice.name, &choice.value);
            }

            cmd = cmd.add_option(option);
        }

        cmd
    }
}

fn validate_name(what: &str, name: &str) -> Result<(), String> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LENGTH
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(format!(
            "{what} name '{name}' must be 1-{MAX_NAME_LENGTH} lowercase letters, digits, '-' or '_'"
        ))
    }
}

fn validate_description(what: &str, name: &str, description: &str) -> Result<(), String> {
    let length = description.chars().count();
    if (1..=MAX_DESCRIPTION_LENGTH).contains(&length) {
        Ok(())
    } else {
        Err(format!(
            "{what} '{name}' needs a description of 1-{MAX_DESCRIPTION_LENGTH} characters, got {length}"
        ))
    }
}
