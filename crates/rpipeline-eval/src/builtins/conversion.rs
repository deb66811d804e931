//! Type conversion functions.
//!
//! Conversions never fail on unconvertible input; they fall back to the
//! `default` argument or a fixed default instead.

use std::net::IpAddr;

use crate::context::EvaluationContext;
use crate::error::{EvalError, EvalResult};
use crate::function::{Function, FunctionArgs, FunctionDescriptor, ParameterDescriptor};
use crate::value::{TypeTag, Value};

#[derive(Debug)]
pub struct StringConversion {
    value: ParameterDescriptor,
    default: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl StringConversion {
    pub const NAME: &'static str = "to_string";

    pub fn new() -> Self {
        let value = ParameterDescriptor::any("value");
        let default = ParameterDescriptor::string("default").optional();
        let descriptor =
            FunctionDescriptor::new(Self::NAME, TypeTag::String, [value.clone(), default.clone()]);
        StringConversion {
            value,
            default,
            descriptor,
        }
    }
}

impl Default for StringConversion {
    fn default() -> Self {
        Self::new()
    }
}

impl Function for StringConversion {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, args: &FunctionArgs, ctx: &mut EvaluationContext) -> EvalResult<Value> {
        let value = self.value.eval_required::<Value>(args, ctx)?;
        let default = self.default.eval_or(args, ctx, String::new())?;
        Ok(Value::String(match value {
            Some(v) => v.to_string(),
            None => default,
        }))
    }
}

#[derive(Debug)]
pub struct LongConversion {
    value: ParameterDescriptor,
    default: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl LongConversion {
    pub const NAME: &'static str = "to_long";

    pub fn new() -> Self {
        let value = ParameterDescriptor::any("value");
        let default = ParameterDescriptor::integer("default").optional();
        let descriptor =
            FunctionDescriptor::new(Self::NAME, TypeTag::Integer, [value.clone(), default.clone()]);
        LongConversion {
            value,
            default,
            descriptor,
        }
    }
}

impl Default for LongConversion {
    fn default() -> Self {
        Self::new()
    }
}

impl Function for LongConversion {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, args: &FunctionArgs, ctx: &mut EvaluationContext) -> EvalResult<Value> {
        let value = self.value.eval_required::<Value>(args, ctx)?;
        let default = self.default.eval_or(args, ctx, 0_i64)?;
        let converted = match value {
            Some(Value::Integer(i)) => Some(i),
            Some(Value::Float(f)) if f.is_finite() => Some(f as i64),
            Some(Value::String(s)) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
            }
            Some(Value::Timestamp(ts)) => Some(ts.timestamp_millis()),
            _ => None,
        };
        Ok(Value::Integer(converted.unwrap_or(default)))
    }
}

#[derive(Debug)]
pub struct DoubleConversion {
    value: ParameterDescriptor,
    default: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl DoubleConversion {
    pub const NAME: &'static str = "to_double";

    pub fn new() -> Self {
        let value = ParameterDescriptor::any("value");
        let default = ParameterDescriptor::floating("default").optional();
        let descriptor =
            FunctionDescriptor::new(Self::NAME, TypeTag::Float, [value.clone(), default.clone()]);
        DoubleConversion {
            value,
            default,
            descriptor,
        }
    }
}

impl Default for DoubleConversion {
    fn default() -> Self {
        Self::new()
    }
}

impl Function for DoubleConversion {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, args: &FunctionArgs, ctx: &mut EvaluationContext) -> EvalResult<Value> {
        let value = self.value.eval_required::<Value>(args, ctx)?;
        let default = self.default.eval_or(args, ctx, 0.0_f64)?;
        let converted = match value {
            Some(Value::Integer(i)) => Some(i as f64),
            Some(Value::Float(f)) => Some(f),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        Ok(Value::Float(converted.unwrap_or(default)))
    }
}

/// `true` for `true`, non-zero numbers and the string `"true"` in any case.
#[derive(Debug)]
pub struct BooleanConversion {
    value: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl BooleanConversion {
    pub const NAME: &'static str = "to_bool";

    pub fn new() -> Self {
        let value = ParameterDescriptor::any("value");
        let descriptor = FunctionDescriptor::new(Self::NAME, TypeTag::Bool, [value.clone()]);
        BooleanConversion { value, descriptor }
    }
}

impl Default for BooleanConversion {
    fn default() -> Self {
        Self::new()
    }
}

impl Function for BooleanConversion {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, args: &FunctionArgs, ctx: &mut EvaluationContext) -> EvalResult<Value> {
        let b = match self.value.eval_required::<Value>(args, ctx)? {
            Some(Value::Bool(b)) => b,
            Some(Value::Integer(i)) => i != 0,
            Some(Value::Float(f)) => f != 0.0,
            Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
            _ => false,
        };
        Ok(Value::Bool(b))
    }
}

/// Parses an address from the string form of any value, falling back to
/// `default` (itself defaulting to `0.0.0.0`).
#[derive(Debug)]
pub struct IpConversion {
    ip: ParameterDescriptor,
    default: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl IpConversion {
    pub const NAME: &'static str = "to_ip";
    const FALLBACK: &'static str = "0.0.0.0";

    pub fn new() -> Self {
        let ip = ParameterDescriptor::any("ip")
            .transform(TypeTag::String, |v| Ok(Value::String(v.to_string())));
        let default = ParameterDescriptor::string("default").optional();
        let descriptor =
            FunctionDescriptor::new(Self::NAME, TypeTag::Ip, [ip.clone(), default.clone()]);
        IpConversion {
            ip,
            default,
            descriptor,
        }
    }
}

impl Default for IpConversion {
    fn default() -> Self {
        Self::new()
    }
}

impl Function for IpConversion {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, args: &FunctionArgs, ctx: &mut EvaluationContext) -> EvalResult<Value> {
        let ip = self.ip.eval_required::<String>(args, ctx)?;
        if let Some(addr) = ip.and_then(|s| s.trim().parse::<IpAddr>().ok()) {
            return Ok(Value::Ip(addr));
        }
        let default = self
            .default
            .eval_or(args, ctx, Self::FALLBACK.to_string())?;
        default
            .trim()
            .parse::<IpAddr>()
            .map(Value::Ip)
            .map_err(|_| EvalError::function(Self::NAME, format!("invalid default address '{default}'")))
    }
}

#[derive(Debug)]
pub struct IsNull {
    value: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl IsNull {
    pub const NAME: &'static str = "is_null";

    pub fn new() -> Self {
        let value = ParameterDescriptor::any("value");
        let descriptor = FunctionDescriptor::new(Self::NAME, TypeTag::Bool, [value.clone()]);
        IsNull { value, descriptor }
    }
}

impl Default for IsNull {
    fn default() -> Self {
        Self::new()
    }
}

impl Function for IsNull {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, args: &FunctionArgs, ctx: &mut EvaluationContext) -> EvalResult<Value> {
        let value = self.value.eval_required::<Value>(args, ctx)?;
        Ok(Value::Bool(value.is_none()))
    }
}

#[derive(Debug)]
pub struct IsNotNull {
    value: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl IsNotNull {
    pub const NAME: &'static str = "is_not_null";

    pub fn new() -> Self {
        let value = ParameterDescriptor::any("value");
        let descriptor = FunctionDescriptor::new(Self::NAME, TypeTag::Bool, [value.clone()]);
        IsNotNull { value, descriptor }
    }
}

impl Default for IsNotNull {
    fn default() -> Self {
        Self::new()
    }
}

impl Function for IsNotNull {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, args: &FunctionArgs, ctx: &mut EvaluationContext) -> EvalResult<Value> {
        let value = self.value.eval_required::<Value>(args, ctx)?;
        Ok(Value::Bool(value.is_some()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use chrono::Utc;

    use crate::expression::{Expression, FunctionExpression};
    use crate::message::Message;

    fn run<F: Function + 'static>(f: F, args: Vec<(&str, Value)>) -> EvalResult<Value> {
        let args: BTreeMap<String, Expression> = args
            .into_iter()
            .map(|(k, v)| (k.to_string(), Expression::Literal(v)))
            .collect();
        let call = FunctionExpression::new(FunctionArgs::new(Arc::new(f), args));
        let mut ctx = EvaluationContext::new(Message::new("m", "s", Utc::now()));
        call.evaluate(&mut ctx)
    }

    #[test]
    fn test_to_string() {
        assert_eq!(run(StringConversion::new(), vec![("value", Value::Integer(1))]).unwrap(), Value::from("1"));
        assert_eq!(
            run(
                StringConversion::new(),
                vec![("value", Value::Null), ("default", Value::from("default"))]
            )
            .unwrap(),
            Value::from("default")
        );
        assert_eq!(run(StringConversion::new(), vec![("value", Value::Null)]).unwrap(), Value::from(""));
    }

    #[test]
    fn test_to_long() {
        assert_eq!(run(LongConversion::new(), vec![("value", Value::from("2"))]).unwrap(), Value::Integer(2));
        assert_eq!(run(LongConversion::new(), vec![("value", Value::Float(2.9))]).unwrap(), Value::Integer(2));
        assert_eq!(run(LongConversion::new(), vec![("value", Value::from("x"))]).unwrap(), Value::Integer(0));
        assert_eq!(
            run(
                LongConversion::new(),
                vec![("value", Value::Bool(true)), ("default", Value::Integer(1))]
            )
            .unwrap(),
            Value::Integer(1)
        );
    }

    #[test]
    fn test_to_double_accepts_integer_default() {
        // integer literals widen to the float parameter
        assert_eq!(
            run(
                DoubleConversion::new(),
                vec![("value", Value::from("nope")), ("default", Value::Integer(1))]
            )
            .unwrap(),
            Value::Float(1.0)
        );
        assert_eq!(run(DoubleConversion::new(), vec![("value", Value::Integer(2))]).unwrap(), Value::Float(2.0));
    }

    #[test]
    fn test_to_bool() {
        for (input, expected) in [
            (Value::Bool(true), true),
            (Value::from("TRUE"), true),
            (Value::from("false"), false),
            (Value::Integer(0), false),
            (Value::Float(1.5), true),
            (Value::Null, false),
        ] {
            assert_eq!(
                run(BooleanConversion::new(), vec![("value", input.clone())]).unwrap(),
                Value::Bool(expected),
                "{input:?}"
            );
        }
    }

    #[test]
    fn test_to_ip() {
        let localhost: IpAddr = "127.0.0.1".parse().unwrap();
        assert_eq!(run(IpConversion::new(), vec![("ip", Value::from("127.0.0.1"))]).unwrap(), Value::Ip(localhost));
        assert_eq!(
            run(IpConversion::new(), vec![("ip", Value::from("garbage"))]).unwrap(),
            Value::Ip("0.0.0.0".parse().unwrap())
        );
        assert_eq!(
            run(IpConversion::new(), vec![("ip", Value::from("garbage")), ("default", Value::from("::1"))]).unwrap(),
            Value::Ip("::1".parse().unwrap())
        );
        assert!(matches!(
            run(IpConversion::new(), vec![("ip", Value::Integer(1)), ("default", Value::from("nope"))]),
            Err(EvalError::Function { .. })
        ));
    }

    #[test]
    fn test_null_checks() {
        assert_eq!(run(IsNull::new(), vec![("value", Value::Null)]).unwrap(), Value::Bool(true));
        assert_eq!(run(IsNotNull::new(), vec![("value", Value::Integer(0))]).unwrap(), Value::Bool(true));
        assert_eq!(run(IsNull::new(), vec![]).unwrap(), Value::Bool(true));
    }
}
