use std::sync::Arc;

use crate::{error::ExecutionError, registry::Registry};

pub mod extensions;

mod module;
pub use module::load_module;

mod userdata;

pub fn create_lua_state(
    registry: Arc<Registry>,
    http: reqwest::Client,
    prefix: &str,
) -> mlua::Result<mlua::Lua> {
    let lua = mlua::Lua::new_with(
        {
            use mlua::StdLib as SL;
            SL::COROUTINE | SL::MATH | SL::STRING | SL::TABLE | SL::UTF8 | SL::VECTOR
        },
        mlua::LuaOptions::new().catch_rust_panics(true),
    )?;

    extensions::register(&lua, registry, http, prefix)?;

    Ok(lua)
}

/// The part of a Lua error worth showing to a user: no tracebacks, no wrapper noise.
pub fn error_message(err: &mlua::Error) -> String {
    match err {
        mlua::Error::CallbackError { cause, .. } => error_message(cause),
        mlua::Error::WithContext { cause, .. } => error_message(cause),
        mlua::Error::ExternalError(err) => err.to_string(),
        mlua::Error::RuntimeError(message) | mlua::Error::SyntaxError { message, .. } => {
            first_line(message)
        }
        other => first_line(&other.to_string()),
    }
}

fn first_line(message: &str) -> String {
    message.lines().next().unwrap_or_default().trim().to_string()
}

impl From<mlua::Error> for ExecutionError {
    fn from(err: mlua::Error) -> Self {
        ExecutionError::Script(error_message(&err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lua() -> mlua::Lua {
        create_lua_state(Arc::default(), reqwest::Client::new(), "::").unwrap()
    }

    #[test]
    fn runtime_errors_drop_the_traceback() {
        let lua = lua();
        let err = lua
            .load("error('boom')")
            .set_name("=test")
            .exec()
            .unwrap_err();
        let message = error_message(&err);
        assert!(message.ends_with("boom"), "{message}");
        assert!(!message.contains('\n'));
    }

    #[test]
    fn syntax_errors_are_one_line() {
        let lua = lua();
        let err = lua.load("return {").set_name("=test").exec().unwrap_err();
        let message = error_message(&err);
        assert!(!message.is_empty());
        assert!(!message.contains('\n'));
    }
}
