use std::sync::Arc;

use mlua::{LuaSerdeExt as _, prelude::*};

use crate::{
    command::{CommandKind, HandlerDescriptor, StructuredCommand, StructuredEntry, TextCommand},
    context::{StructuredContext, TextContext},
    error::{ExecutionError, LoadError},
    schema::StructuredSchema,
};

use super::{
    error_message,
    userdata::{LuaInteraction, LuaMessage},
};

/// Evaluates one module file and turns the table it returns into a descriptor.
///
/// The module must return a table with `name` and `execute`, or `data` and
/// `execute_slash`, or both.
pub fn load_module(
    lua: &Lua,
    unit: &str,
    file: &str,
    code: &str,
) -> Result<HandlerDescriptor, LoadError> {
    let module_error = |message: String| LoadError::Module {
        file: file.to_string(),
        message,
    };
    let lua_error = |err: LuaError| module_error(error_message(&err));

    let value: LuaValue = lua
        .load(code)
        .set_name(format!("={unit}/{file}"))
        .eval()
        .map_err(lua_error)?;
    let module = match value {
        LuaValue::Table(module) => module,
        other => {
            return Err(module_error(format!(
                "expected the module to return a table, got {}",
                other.type_name()
            )));
        }
    };

    let name: Option<String> = module.get("name").map_err(lua_error)?;
    let description: Option<String> = module.get("description").map_err(lua_error)?;
    let aliases: Option<Vec<String>> = module.get("aliases").map_err(lua_error)?;
    let execute: Option<LuaFunction> = module.get("execute").map_err(lua_error)?;
    let data: Option<LuaTable> = module.get("data").map_err(lua_error)?;
    let execute_slash: Option<LuaFunction> = module.get("execute_slash").map_err(lua_error)?;

    let text = match (&name, execute) {
        (Some(_), Some(func)) => Some(Arc::new(LuaTextCommand {
            lua: lua.clone(),
            func,
        }) as Arc<dyn TextCommand>),
        _ => None,
    };

    let structured = match (data, execute_slash) {
        (Some(data), Some(func)) => {
            let schema: StructuredSchema = lua
                .from_value(LuaValue::Table(data))
                .map_err(|err| module_error(format!("invalid data: {}", error_message(&err))))?;
            schema.validate().map_err(module_error)?;
            Some(StructuredEntry {
                schema,
                handler: Arc::new(LuaStructuredCommand {
                    lua: lua.clone(),
                    func,
                }),
            })
        }
        _ => None,
    };

    let Some(kind) = CommandKind::new(text, structured) else {
        return Err(LoadError::MissingContract {
            file: file.to_string(),
        });
    };

    let schema = kind.structured().map(|s| &s.schema);
    let name = match (kind.text(), name, schema) {
        (Some(_), Some(name), _) => name,
        (_, _, Some(schema)) => schema.name.clone(),
        _ => String::new(),
    };
    let name = name.trim().to_lowercase();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(module_error(format!("invalid command name '{name}'")));
    }

    let description = description
        .or_else(|| schema.map(|s| s.description.clone()))
        .unwrap_or_else(|| "No description".to_string());

    let aliases = aliases
        .unwrap_or_default()
        .into_iter()
        .map(|alias| alias.trim().to_lowercase())
        .filter(|alias| !alias.is_empty() && *alias != name)
        .collect();

    Ok(HandlerDescriptor {
        name,
        aliases,
        description,
        unit: unit.to_string(),
        source: file.to_string(),
        kind,
    })
}

/// `execute(message, args)` from a module.
struct LuaTextCommand {
    lua: Lua,
    func: LuaFunction,
}
#[serenity::async_trait]
impl TextCommand for LuaTextCommand {
    async fn execute(
        &self,
        ctx: Arc<dyn TextContext>,
        args: Vec<String>,
    ) -> Result<(), ExecutionError> {
        let message = self.lua.create_userdata(LuaMessage(ctx.clone()))?;
        let args = self.lua.create_sequence_from(args)?;

        // A returned string is sent as the reply
        let result: LuaValue = self.func.call_async((message, args)).await?;
        if let Some(reply) = returned_text(&result) {
            ctx.reply(&reply).await?;
        }
        Ok(())
    }
}

/// `execute_slash(interaction)` from a module.
struct LuaStructuredCommand {
    lua: Lua,
    func: LuaFunction,
}
#[serenity::async_trait]
impl StructuredCommand for LuaStructuredCommand {
    async fn execute(&self, invocation: Arc<dyn StructuredContext>) -> Result<(), ExecutionError> {
        let interaction = self
            .lua
            .create_userdata(LuaInteraction(invocation.clone()))?;

        let result: LuaValue = self.func.call_async(interaction).await?;
        if let Some(reply) = returned_text(&result) {
            if invocation.has_responded() {
                invocation.follow_up(&reply).await?;
            } else {
                invocation.reply(&reply).await?;
            }
        }
        Ok(())
    }
}

fn returned_text(value: &LuaValue) -> Option<String> {
    match value {
        LuaValue::String(s) => Some(s.to_string_lossy()).filter(|s| !s.is_empty()),
        _ => None,
    }
}
