//! Functions that read and modify messages.
//!
//! Every field function takes an optional `message` argument holding a
//! handle returned by `create_message`; without it the current message is
//! used.

use chrono::{DateTime, Utc};

use crate::context::EvaluationContext;
use crate::error::{EvalError, EvalResult};
use crate::function::{Function, FunctionArgs, FunctionDescriptor, ParameterDescriptor};
use crate::message::Message;
use crate::value::{MessageHandle, TypeTag, Value};

fn target_param() -> ParameterDescriptor {
    ParameterDescriptor::message("message").optional()
}

fn affixed(prefix: Option<String>, name: &str, suffix: Option<String>) -> String {
    format!(
        "{}{name}{}",
        prefix.unwrap_or_default(),
        suffix.unwrap_or_default()
    )
}

// =============================================================================
// has_field
// =============================================================================

#[derive(Debug)]
pub struct HasField {
    field: ParameterDescriptor,
    message: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl HasField {
    pub const NAME: &'static str = "has_field";

    pub fn new() -> Self {
        let field = ParameterDescriptor::string("field");
        let message = target_param();
        let descriptor =
            FunctionDescriptor::new(Self::NAME, TypeTag::Bool, [field.clone(), message.clone()]);
        HasField {
            field,
            message,
            descriptor,
        }
    }
}

impl Default for HasField {
    fn default() -> Self {
        Self::new()
    }
}

impl Function for HasField {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, args: &FunctionArgs, ctx: &mut EvaluationContext) -> EvalResult<Value> {
        let field: String = self.field.require(args, ctx)?;
        let target = self.message.eval_required::<MessageHandle>(args, ctx)?;
        Ok(Value::Bool(ctx.message(target)?.has_field(&field)))
    }
}

// =============================================================================
// set_field / set_fields
// =============================================================================

#[derive(Debug)]
pub struct SetField {
    field: ParameterDescriptor,
    value: ParameterDescriptor,
    prefix: ParameterDescriptor,
    suffix: ParameterDescriptor,
    message: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl SetField {
    pub const NAME: &'static str = "set_field";

    pub fn new() -> Self {
        let field = ParameterDescriptor::string("field");
        let value = ParameterDescriptor::any("value");
        let prefix = ParameterDescriptor::string("prefix").optional();
        let suffix = ParameterDescriptor::string("suffix").optional();
        let message = target_param();
        let descriptor = FunctionDescriptor::new(
            Self::NAME,
            TypeTag::Void,
            [
                field.clone(),
                value.clone(),
                prefix.clone(),
                suffix.clone(),
                message.clone(),
            ],
        );
        SetField {
            field,
            value,
            prefix,
            suffix,
            message,
            descriptor,
        }
    }
}

impl Default for SetField {
    fn default() -> Self {
        Self::new()
    }
}

impl Function for SetField {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, args: &FunctionArgs, ctx: &mut EvaluationContext) -> EvalResult<Value> {
        let field: String = self.field.require(args, ctx)?;
        let value = self.value.eval_required::<Value>(args, ctx)?;
        let prefix = self.prefix.eval_required::<String>(args, ctx)?;
        let suffix = self.suffix.eval_required::<String>(args, ctx)?;
        let target = self.message.eval_required::<MessageHandle>(args, ctx)?;

        match value {
            Some(Value::Message(_)) => Err(EvalError::coercion(
                TypeTag::Any,
                TypeTag::Message,
                format!("value of field '{field}'"),
            )),
            Some(value) => {
                let name = affixed(prefix, &field, suffix);
                ctx.message_mut(target)?.add_field(name, value);
                Ok(Value::Null)
            }
            None => Ok(Value::Null),
        }
    }
}

#[derive(Debug)]
pub struct SetFields {
    fields: ParameterDescriptor,
    prefix: ParameterDescriptor,
    suffix: ParameterDescriptor,
    message: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl SetFields {
    pub const NAME: &'static str = "set_fields";

    pub fn new() -> Self {
        let fields = ParameterDescriptor::object("fields");
        let prefix = ParameterDescriptor::string("prefix").optional();
        let suffix = ParameterDescriptor::string("suffix").optional();
        let message = target_param();
        let descriptor = FunctionDescriptor::new(
            Self::NAME,
            TypeTag::Void,
            [fields.clone(), prefix.clone(), suffix.clone(), message.clone()],
        );
        SetFields {
            fields,
            prefix,
            suffix,
            message,
            descriptor,
        }
    }
}

impl Default for SetFields {
    fn default() -> Self {
        Self::new()
    }
}

impl Function for SetFields {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, args: &FunctionArgs, ctx: &mut EvaluationContext) -> EvalResult<Value> {
        let fields: serde_json::Value = self.fields.require(args, ctx)?;
        let prefix = self.prefix.eval_required::<String>(args, ctx)?;
        let suffix = self.suffix.eval_required::<String>(args, ctx)?;
        let target = self.message.eval_required::<MessageHandle>(args, ctx)?;

        let serde_json::Value::Object(fields) = fields else {
            return Err(EvalError::function(
                Self::NAME,
                "'fields' must be an object, not an array",
            ));
        };
        let message = ctx.message_mut(target)?;
        for (name, value) in &fields {
            let name = affixed(prefix.clone(), name, suffix.clone());
            message.add_field(name, Value::from_json(value));
        }
        Ok(Value::Null)
    }
}

// =============================================================================
// remove_field / rename_field
// =============================================================================

#[derive(Debug)]
pub struct RemoveField {
    field: ParameterDescriptor,
    message: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl RemoveField {
    pub const NAME: &'static str = "remove_field";

    pub fn new() -> Self {
        let field = ParameterDescriptor::string("field");
        let message = target_param();
        let descriptor =
            FunctionDescriptor::new(Self::NAME, TypeTag::Void, [field.clone(), message.clone()]);
        RemoveField {
            field,
            message,
            descriptor,
        }
    }
}

impl Default for RemoveField {
    fn default() -> Self {
        Self::new()
    }
}

impl Function for RemoveField {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, args: &FunctionArgs, ctx: &mut EvaluationContext) -> EvalResult<Value> {
        let field: String = self.field.require(args, ctx)?;
        let target = self.message.eval_required::<MessageHandle>(args, ctx)?;
        ctx.message_mut(target)?.remove_field(&field);
        Ok(Value::Null)
    }
}

#[derive(Debug)]
pub struct RenameField {
    old_field: ParameterDescriptor,
    new_field: ParameterDescriptor,
    message: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl RenameField {
    pub const NAME: &'static str = "rename_field";

    pub fn new() -> Self {
        let old_field = ParameterDescriptor::string("old_field");
        let new_field = ParameterDescriptor::string("new_field");
        let message = target_param();
        let descriptor = FunctionDescriptor::new(
            Self::NAME,
            TypeTag::Void,
            [old_field.clone(), new_field.clone(), message.clone()],
        );
        RenameField {
            old_field,
            new_field,
            message,
            descriptor,
        }
    }
}

impl Default for RenameField {
    fn default() -> Self {
        Self::new()
    }
}

impl Function for RenameField {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, args: &FunctionArgs, ctx: &mut EvaluationContext) -> EvalResult<Value> {
        let old_field: String = self.old_field.require(args, ctx)?;
        let new_field: String = self.new_field.require(args, ctx)?;
        let target = self.message.eval_required::<MessageHandle>(args, ctx)?;

        if old_field == new_field {
            return Ok(Value::Null);
        }
        let message = ctx.message_mut(target)?;
        let Some(value) = message.remove_field(&old_field) else {
            return Ok(Value::Null);
        };
        if !message.add_field(new_field.as_str(), value.clone()) {
            message.add_field(old_field.as_str(), value);
            return Err(EvalError::function(
                Self::NAME,
                format!("field '{old_field}' cannot be stored as '{new_field}'"),
            ));
        }
        Ok(Value::Null)
    }
}

// =============================================================================
// create_message / drop_message
// =============================================================================

/// Creates a message next to the current one and returns its handle.
///
/// `source` defaults to the current message's source and `timestamp` to
/// the time of the call.
#[derive(Debug)]
pub struct CreateMessage {
    message: ParameterDescriptor,
    source: ParameterDescriptor,
    timestamp: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl CreateMessage {
    pub const NAME: &'static str = "create_message";

    pub fn new() -> Self {
        let message = ParameterDescriptor::string("message").optional();
        let source = ParameterDescriptor::string("source").optional();
        let timestamp = ParameterDescriptor::timestamp("timestamp").optional();
        let descriptor = FunctionDescriptor::new(
            Self::NAME,
            TypeTag::Message,
            [message.clone(), source.clone(), timestamp.clone()],
        );
        CreateMessage {
            message,
            source,
            timestamp,
            descriptor,
        }
    }
}

impl Default for CreateMessage {
    fn default() -> Self {
        Self::new()
    }
}

impl Function for CreateMessage {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, args: &FunctionArgs, ctx: &mut EvaluationContext) -> EvalResult<Value> {
        let text = self.message.eval_required::<String>(args, ctx)?;
        let source = match self.source.eval_required::<String>(args, ctx)? {
            Some(source) => source,
            None => ctx
                .current_message()
                .source()
                .unwrap_or_default()
                .to_string(),
        };
        let timestamp = self
            .timestamp
            .eval_required::<DateTime<Utc>>(args, ctx)?
            .unwrap_or_else(Utc::now);

        let created = Message::new(text.unwrap_or_default(), source, timestamp);
        Ok(Value::Message(ctx.create_message(created)))
    }
}

/// Marks the current message as dropped.
#[derive(Debug)]
pub struct DropMessage {
    descriptor: FunctionDescriptor,
}

impl DropMessage {
    pub const NAME: &'static str = "drop_message";

    pub fn new() -> Self {
        DropMessage {
            descriptor: FunctionDescriptor::new(Self::NAME, TypeTag::Void, []),
        }
    }
}

impl Default for DropMessage {
    fn default() -> Self {
        Self::new()
    }
}

impl Function for DropMessage {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, _: &FunctionArgs, ctx: &mut EvaluationContext) -> EvalResult<Value> {
        ctx.drop_message();
        Ok(Value::Null)
    }
}
