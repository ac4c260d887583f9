use std::sync::Arc;

use mlua::prelude::*;

use crate::context::{OptionValue, StructuredContext, TextContext};

/// The `message` handed to `execute`.
pub struct LuaMessage(pub Arc<dyn TextContext>);
impl LuaUserData for LuaMessage {
    fn add_fields<F: LuaUserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("author_id", |_, this| {
            Ok(this.0.author_id().get().to_string())
        });
        fields.add_field_method_get("author_name", |_, this| {
            Ok(this.0.author_name().to_string())
        });
        fields.add_field_method_get("channel_id", |_, this| {
            Ok(this.0.channel_id().get().to_string())
        });
        fields.add_field_method_get("guild_id", |_, this| {
            Ok(this.0.guild_id().map(|id| id.get().to_string()))
        });
        fields.add_field_method_get("content", |_, this| Ok(this.0.content().to_string()));
    }

    fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
        methods.add_async_method("reply", |_, this, content: String| {
            let ctx = this.0.clone();
            async move { ctx.reply(&content).await.map_err(LuaError::external) }
        });
        methods.add_async_method("send", |_, this, content: String| {
            let ctx = this.0.clone();
            async move { ctx.send(&content).await.map_err(LuaError::external) }
        });
    }
}

/// The `interaction` handed to `execute_slash`.
pub struct LuaInteraction(pub Arc<dyn StructuredContext>);
impl LuaUserData for LuaInteraction {
    fn add_fields<F: LuaUserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("command_name", |_, this| {
            Ok(this.0.command_name().to_string())
        });
        fields.add_field_method_get("user_id", |_, this| Ok(this.0.user_id().get().to_string()));
        fields.add_field_method_get("channel_id", |_, this| {
            Ok(this.0.channel_id().get().to_string())
        });
        fields.add_field_method_get("guild_id", |_, this| {
            Ok(this.0.guild_id().map(|id| id.get().to_string()))
        });
        fields.add_field_method_get("options", |lua, this| {
            let options = lua.create_table()?;
            for (name, value) in this.0.options() {
                match value {
                    OptionValue::String(s) => options.set(name.as_str(), s.as_str())?,
                    OptionValue::Integer(i) => options.set(name.as_str(), *i)?,
                    OptionValue::Number(n) => options.set(name.as_str(), *n)?,
                    OptionValue::Boolean(b) => options.set(name.as_str(), *b)?,
                }
            }
            Ok(options)
        });
    }

    fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
        methods.add_async_method("reply", |_, this, content: String| {
            let ctx = this.0.clone();
            async move { ctx.reply(&content).await.map_err(LuaError::external) }
        });
        methods.add_async_method("defer", |_, this, ()| {
            let ctx = this.0.clone();
            async move { ctx.defer().await.map_err(LuaError::external) }
        });
        methods.add_async_method("edit_reply", |_, this, content: String| {
            let ctx = this.0.clone();
            async move { ctx.edit_reply(&content).await.map_err(LuaError::external) }
        });
        methods.add_async_method("follow_up", |_, this, content: String| {
            let ctx = this.0.clone();
            async move { ctx.follow_up(&content).await.map_err(LuaError::external) }
        });
    }
}
