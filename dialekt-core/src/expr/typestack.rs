//! Declarator type-stack builder.
//!
//! The grammar accumulates pointer/reference/array/function/qualifier
//! modifiers around a base type and folds them with [`TypeStack::follow`].
//! Parenthesized sub-declarators (`int (*)[10]`) are pushed as nested
//! stacks so they apply after the suffixes of their own level, which is
//! what gives C declarators their inside-out reading.
//!
//! The parser arranges elements so that popping applies modifiers
//! innermost-first: suffix modifiers (`[]`, `(...)`) bind tighter than
//! prefix ones (`*`, `&`) unless a parenthesized group intervenes.

use crate::expr::error::ParseError;
use crate::types::{Type, TypeQual};

/// One declarator modifier.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeMod {
    Pointer,
    Reference { rvalue: bool },
    ArrayOf(Option<u64>),
    FunctionWith { params: Vec<Type>, varargs: bool },
    Qualifier(TypeQual),
}

#[derive(Debug, Clone, PartialEq)]
enum Entry {
    Mod(TypeMod),
    /// A parenthesized sub-declarator, applied as a unit.
    Group(TypeStack),
}

/// Ordered collection of declarator modifiers owned by a single parse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeStack {
    entries: Vec<Entry>,
}

impl TypeStack {
    pub fn new() -> TypeStack {
        TypeStack::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Push a modifier on top; it will be applied before everything
    /// already on the stack.
    pub fn push(&mut self, m: TypeMod) {
        self.entries.push(Entry::Mod(m));
    }

    /// Push a parenthesized sub-declarator as a single unit.
    pub fn push_stack(&mut self, sub: TypeStack) {
        if !sub.is_empty() {
            self.entries.push(Entry::Group(sub));
        }
    }

    /// Fold every entry onto `base`, innermost modifier first, fully
    /// draining the stack.
    pub fn follow(&mut self, base: Type) -> Result<Type, ParseError> {
        let mut ty = base;
        while let Some(entry) = self.entries.pop() {
            ty = match entry {
                Entry::Mod(TypeMod::Pointer) => Type::pointer(ty),
                Entry::Mod(TypeMod::Reference { rvalue }) => Type::Reference {
                    target: Box::new(ty),
                    rvalue,
                },
                Entry::Mod(TypeMod::ArrayOf(len)) => {
                    if matches!(ty, Type::Void) {
                        return Err(ParseError::semantic("cannot create an array of void"));
                    }
                    Type::array(ty, len)
                }
                Entry::Mod(TypeMod::FunctionWith { params, varargs }) => Type::Function {
                    ret: Box::new(ty),
                    params,
                    varargs,
                },
                Entry::Mod(TypeMod::Qualifier(q)) => Type::qualified(q, ty),
                Entry::Group(mut sub) => sub.follow(ty)?,
            };
        }
        Ok(ty)
    }

    /// A non-empty stack after top-level parse completion is a parser
    /// bug; callers invoke this once the whole expression is reduced.
    pub fn check_drained(&self) -> Result<(), ParseError> {
        if self.entries.is_empty() {
            Ok(())
        } else {
            Err(ParseError::Internal(format!(
                "type stack not drained: {} entries left",
                self.entries.len()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn followed(mods: Vec<TypeMod>) -> Type {
        let mut st = TypeStack::new();
        for m in mods {
            st.push(m);
        }
        st.follow(Type::int()).unwrap()
    }

    #[test]
    fn pointer_chain() {
        // stack top applies first: int ** from [Ptr, Ptr]
        let ty = followed(vec![TypeMod::Pointer, TypeMod::Pointer]);
        assert_eq!(ty, Type::pointer(Type::pointer(Type::int())));
    }

    #[test]
    fn array_of_pointers_vs_pointer_to_array() {
        // int *[10]: pointer applies first (it is on top)
        let mut st = TypeStack::new();
        st.push(TypeMod::ArrayOf(Some(10)));
        st.push(TypeMod::Pointer);
        let ty = st.follow(Type::int()).unwrap();
        assert_eq!(ty, Type::array(Type::pointer(Type::int()), Some(10)));

        // int (*)[10]: the group applies after the array suffix
        let mut inner = TypeStack::new();
        inner.push(TypeMod::Pointer);
        let mut st = TypeStack::new();
        st.push_stack(inner);
        st.push(TypeMod::ArrayOf(Some(10)));
        let ty = st.follow(Type::int()).unwrap();
        assert_eq!(ty, Type::pointer(Type::array(Type::int(), Some(10))));
    }

    #[test]
    fn function_pointer() {
        let mut inner = TypeStack::new();
        inner.push(TypeMod::Pointer);
        let mut st = TypeStack::new();
        st.push_stack(inner);
        st.push(TypeMod::FunctionWith {
            params: vec![Type::int()],
            varargs: false,
        });
        let ty = st.follow(Type::Void).unwrap();
        assert_eq!(
            ty,
            Type::pointer(Type::Function {
                ret: Box::new(Type::Void),
                params: vec![Type::int()],
                varargs: false,
            })
        );
    }

    #[test]
    fn follow_fully_drains() {
        let mut st = TypeStack::new();
        st.push(TypeMod::Pointer);
        st.push(TypeMod::Qualifier(TypeQual::Const));
        let _ = st.follow(Type::int()).unwrap();
        assert!(st.is_empty());
        assert!(st.check_drained().is_ok());
    }

    #[test]
    fn volatile_pointer() {
        // `* volatile`: pointer pops first, qualifier wraps the pointer
        let mut st = TypeStack::new();
        st.push(TypeMod::Qualifier(TypeQual::Volatile));
        st.push(TypeMod::Pointer);
        let ty = st.follow(Type::int()).unwrap();
        assert_eq!(
            ty,
            Type::qualified(TypeQual::Volatile, Type::pointer(Type::int()))
        );
    }
}
