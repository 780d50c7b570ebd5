//! Constant folding toward a required type.

use unrealscript_core::{PropertyKind, PropertyType};

use crate::context::CompilerContext;
use crate::ir::Constant;

impl<'a> CompilerContext<'a> {
    /// Rewrite a constant into the required kind when that loses nothing.
    ///
    /// Anything that doesn't fold is returned unchanged and left to the
    /// normal conversion rules.
    pub(crate) fn attempt_to_convert(
        &self,
        constant: Constant,
        ty: PropertyType,
        required: &PropertyType,
    ) -> (Constant, PropertyType) {
        let folded = match required.kind {
            PropertyKind::Int => as_int(&constant).map(|value| (Constant::Int(value), PropertyType::new(PropertyKind::Int))),
            PropertyKind::Float => {
                as_float(&constant).map(|value| (Constant::Float(value), PropertyType::new(PropertyKind::Float)))
            }
            PropertyKind::Byte if required.enum_def.is_none() => {
                as_byte(&constant).map(|value| (Constant::Byte(value), PropertyType::byte(None)))
            }
            _ => None,
        };
        folded.unwrap_or((constant, ty))
    }
}

fn as_int(constant: &Constant) -> Option<i32> {
    match *constant {
        Constant::Int(value) => Some(value),
        Constant::Byte(value) => Some(i32::from(value)),
        Constant::Float(value) if value == value.trunc() => Some(value as i32),
        _ => None,
    }
}

fn as_float(constant: &Constant) -> Option<f32> {
    match *constant {
        Constant::Float(value) => Some(value),
        Constant::Int(value) => Some(value as f32),
        Constant::Byte(value) => Some(f32::from(value)),
        _ => None,
    }
}

fn as_byte(constant: &Constant) -> Option<u8> {
    match *constant {
        Constant::Byte(value) => Some(value),
        Constant::Int(value) => u8::try_from(value).ok(),
        Constant::Float(value) if (0.0..255.0).contains(&value) && value == value.trunc() => Some(value as u8),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_float_folds_to_int() {
        assert_eq!(as_int(&Constant::Float(3.0)), Some(3));
        assert_eq!(as_int(&Constant::Float(3.5)), None);
        assert_eq!(as_int(&Constant::Byte(7)), Some(7));
    }

    #[test]
    fn byte_range() {
        assert_eq!(as_byte(&Constant::Int(255)), Some(255));
        assert_eq!(as_byte(&Constant::Int(256)), None);
        assert_eq!(as_byte(&Constant::Int(-1)), None);
        assert_eq!(as_byte(&Constant::Float(255.0)), None);
    }

    #[test]
    fn strings_never_fold() {
        assert_eq!(as_float(&Constant::String("1".into())), None);
        assert_eq!(as_int(&Constant::Bool(true)), None);
    }
}
