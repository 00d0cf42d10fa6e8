use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    Int(u32),
    Half,
    Float,
    Double,
    Ptr,
    Label,
    Array(u64, Box<Type>),
    Vector(u64, Box<Type>),
    Struct(Vec<Type>),
}

impl Type {
    pub const I1: Type = Type::Int(1);
    pub const I8: Type = Type::Int(8);
    pub const I32: Type = Type::Int(32);
    pub const I64: Type = Type::Int(64);

    pub fn is_int(&self, bits: u32) -> bool {
        matches!(self, Type::Int(b) if *b == bits)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::Half | Type::Float | Type::Double)
    }

    pub fn is_ptr(&self) -> bool {
        matches!(self, Type::Ptr)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    // extractvalue/insertvalue index into structs and arrays
    pub fn aggregate_field(&self, index: u32) -> Option<&Type> {
        match self {
            Type::Struct(fields) => fields.get(index as usize),
            Type::Array(len, elem) if u64::from(index) < *len => Some(elem),
            _ => None,
        }
    }

    pub fn vector_element(&self) -> Option<&Type> {
        match self {
            Type::Vector(_, elem) => Some(elem),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Int(bits) => write!(f, "i{}", bits),
            Type::Half => write!(f, "half"),
            Type::Float => write!(f, "float"),
            Type::Double => write!(f, "double"),
            Type::Ptr => write!(f, "ptr"),
            Type::Label => write!(f, "label"),
            Type::Array(len, elem) => write!(f, "[{} x {}]", len, elem),
            Type::Vector(len, elem) => write!(f, "<{} x {}>", len, elem),
            Type::Struct(fields) => {
                write!(f, "{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", field)?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_aggregates() {
        let typ = Type::Struct(vec![
            Type::I32,
            Type::Array(4, Box::new(Type::I8)),
            Type::Vector(2, Box::new(Type::Double)),
        ]);
        assert_eq!(typ.to_string(), "{i32, [4 x i8], <2 x double>}");
        assert_eq!(typ.aggregate_field(1), Some(&Type::Array(4, Box::new(Type::I8))));
        assert_eq!(typ.aggregate_field(3), None);
    }
}
