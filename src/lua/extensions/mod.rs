use std::sync::Arc;

use crate::registry::Registry;

mod commands;
mod globals;
mod http;

pub fn register(
    lua: &mlua::Lua,
    registry: Arc<Registry>,
    http_client: reqwest::Client,
    prefix: &str,
) -> mlua::Result<()> {
    globals::register(lua)?;
    http::register(lua, http_client)?;
    commands::register(lua, registry, prefix)?;
    Ok(())
}
