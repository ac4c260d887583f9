use mlua::{LuaSerdeExt as _, prelude::*};

/// Register `http.get` and `http.get_json`.
pub fn register(lua: &Lua, client: reqwest::Client) -> LuaResult<()> {
    let http = lua.create_table()?;

    http.set(
        "get",
        lua.create_async_function({
            let client = client.clone();
            move |lua, url: String| {
                let client = client.clone();
                async move {
                    let response = client
                        .get(&url)
                        .send()
                        .await
                        .map_err(|e| LuaError::RuntimeError(e.to_string()))?;
                    let status = response.status().as_u16();
                    let body = response
                        .text()
                        .await
                        .map_err(|e| LuaError::RuntimeError(e.to_string()))?;

                    let result = lua.create_table()?;
                    result.set("status", status)?;
                    result.set("body", body)?;
                    Ok(result)
                }
            }
        })?,
    )?;

    http.set(
        "get_json",
        lua.create_async_function({
            let client = client.clone();
            move |lua, url: String| {
                let client = client.clone();
                async move {
                    let value: serde_json::Value = client
                        .get(&url)
                        .send()
                        .await
                        .and_then(|r| r.error_for_status())
                        .map_err(|e| LuaError::RuntimeError(e.to_string()))?
                        .json()
                        .await
                        .map_err(|e| LuaError::RuntimeError(e.to_string()))?;
                    lua.to_value(&value)
                }
            }
        })?,
    )?;

    lua.globals().set("http", http)?;

    Ok(())
}
