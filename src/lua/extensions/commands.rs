use std::sync::Arc;

use mlua::prelude::*;

use crate::{command::HandlerDescriptor, registry::Registry};

/// Read-only view of the registry, for help-style commands.
pub fn register(lua: &Lua, registry: Arc<Registry>, prefix: &str) -> LuaResult<()> {
    let commands = lua.create_table()?;
    commands.set("prefix", prefix)?;

    commands.set(
        "lookup",
        lua.create_function({
            let registry = registry.clone();
            move |lua, key: String| {
                let key = key.to_lowercase();
                registry
                    .lookup(&key)
                    .or_else(|| registry.lookup_structured(&key))
                    .map(|descriptor| descriptor_table(lua, &descriptor))
                    .transpose()
            }
        })?,
    )?;

    commands.set(
        "list",
        lua.create_function({
            let registry = registry.clone();
            move |lua, ()| {
                let list = lua.create_table()?;
                for (i, descriptor) in registry.commands().iter().enumerate() {
                    list.set(i + 1, descriptor_table(lua, descriptor)?)?;
                }
                Ok(list)
            }
        })?,
    )?;

    commands.set(
        "units",
        lua.create_function({
            let registry = registry.clone();
            move |lua, ()| lua.create_sequence_from(registry.loaded_units())
        })?,
    )?;

    lua.globals().set("commands", commands)?;

    Ok(())
}

fn descriptor_table(lua: &Lua, descriptor: &HandlerDescriptor) -> LuaResult<LuaTable> {
    let table = lua.create_table()?;
    table.set("name", descriptor.name.as_str())?;
    table.set("description", descriptor.description.as_str())?;
    table.set("unit", descriptor.unit.as_str())?;
    table.set(
        "aliases",
        lua.create_sequence_from(descriptor.aliases.iter().map(String::as_str))?,
    )?;
    table.set("slash", descriptor.structured_name().is_some())?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::testing::{Canned, text_descriptor};

    #[test]
    fn scripts_can_look_up_commands() {
        let registry = Arc::new(Registry::default());
        registry.install_unit(
            "misc",
            vec![text_descriptor("misc", "quote", &["q"], Canned::replying("x"))],
        );

        let lua = Lua::new();
        register(&lua, registry, "::").unwrap();

        let (name, alias, unit, missing): (String, String, String, bool) = lua
            .load(
                r#"
local found = commands.lookup("Q")
return found.name, found.aliases[1], commands.units()[1], commands.lookup("nope") == nil
"#,
            )
            .eval()
            .unwrap();
        assert_eq!(name, "quote");
        assert_eq!(alias, "q");
        assert_eq!(unit, "misc");
        assert!(missing);

        let count: i64 = lua.load("return #commands.list()").eval().unwrap();
        assert_eq!(count, 1);
    }
}
