use mlua::{LuaSerdeExt as _, prelude::*};

pub fn register(lua: &Lua) -> LuaResult<()> {
    lua.globals().set(
        "sleep",
        lua.create_async_function(|_lua, ms: u32| async move {
            tokio::time::sleep(std::time::Duration::from_millis(ms as u64)).await;
            Ok(())
        })?,
    )?;

    // `os` is not loaded, so wall-clock time comes from here
    lua.globals().set(
        "now_ms",
        lua.create_function(|_lua, ()| {
            let elapsed = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map_err(LuaError::external)?;
            Ok(elapsed.as_millis() as f64)
        })?,
    )?;

    // Scripts have no console; their prints go to the log
    lua.globals().set(
        "print",
        lua.create_function(|_lua, values: LuaVariadic<LuaValue>| {
            let output = values
                .iter()
                .map(|v| v.to_string())
                .collect::<LuaResult<Vec<_>>>()?
                .join("\t");
            tracing::info!(target: "script", "{output}");
            Ok(())
        })?,
    )?;

    let json = lua.create_table()?;
    json.set(
        "encode",
        lua.create_function(|_lua, value: LuaValue| {
            serde_json::to_string(&value).map_err(LuaError::external)
        })?,
    )?;
    json.set(
        "decode",
        lua.create_function(|lua, text: String| {
            let value: serde_json::Value =
                serde_json::from_str(&text).map_err(LuaError::external)?;
            lua.to_value(&value)
        })?,
    )?;
    lua.globals().set("json", json)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trips_through_tables() {
        let lua = Lua::new();
        register(&lua).unwrap();

        let (name, count): (String, i64) = lua
            .load(
                r#"
local value = json.decode('{"name":"pacman","count":3}')
local again = json.decode(json.encode(value))
return again.name, again.count
"#,
            )
            .eval()
            .unwrap();
        assert_eq!(name, "pacman");
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn sleep_yields_to_the_runtime() {
        let lua = Lua::new();
        register(&lua).unwrap();

        let value: i64 = lua
            .load("sleep(1); return 7")
            .eval_async()
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn clock_moves_forward_across_sleeps() {
        let lua = Lua::new();
        register(&lua).unwrap();

        let elapsed: f64 = lua
            .load("local start = now_ms(); sleep(5); return now_ms() - start")
            .eval_async()
            .await
            .unwrap();
        assert!(elapsed >= 0.0);
    }
}
