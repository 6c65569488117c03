//! Expression printer and diagnostic dumper.
//!
//! `print` re-renders a tree as infix source text, threading the
//! required precedence down the walk and inserting parentheses only
//! where a child binds looser than its context demands - so printing
//! exactly inverts the grouping a parse produced. `dump` is a flat
//! pre-order listing for debugging.

use std::fmt::Write;

use crate::expr::ast::{Operation, SizeArg, UnaryOpcode};
use crate::lang::{binary_op_info, DialectKind, Prec};
use crate::types::Type;

/// Render `op` back to source-like text.
pub fn print(op: &Operation, dialect: DialectKind) -> String {
    let mut out = String::new();
    print_subexp(op, dialect, Prec::Comma, &mut out);
    out
}

fn print_subexp(op: &Operation, dialect: DialectKind, required: Prec, out: &mut String) {
    match op {
        Operation::IntLiteral { ty, value } => {
            let _ = write!(out, "{}{}", value, int_suffix(ty));
        }
        Operation::FloatLiteral { ty, value } => {
            print_float(*value, out);
            out.push_str(float_suffix(ty));
        }
        Operation::ComplexLiteral { re, im, .. } => {
            if *re == 0.0 {
                print_float(*im, out);
                out.push('i');
            } else {
                out.push('(');
                print_float(*re, out);
                out.push_str(" + ");
                print_float(*im, out);
                out.push_str("i)");
            }
        }
        Operation::BoolLiteral { value } => {
            out.push_str(if *value { "true" } else { "false" });
        }
        Operation::CharLiteral { encoding, value } => {
            out.push_str(encoding.prefix());
            out.push('\'');
            push_char(*value, out);
            out.push('\'');
        }
        Operation::StringLiteral { encoding, bytes } => {
            // escape from the decoded form, so pass-through escapes and
            // resolved bytes cannot be confused with each other
            let decoded = crate::value::decode_escapes(bytes, *encoding);
            out.push_str(encoding.prefix());
            out.push('"');
            for &b in &decoded {
                push_byte(b, out);
            }
            out.push('"');
        }

        Operation::Unary { op: uop, operand } => {
            let needs = required > Prec::Unary;
            if needs {
                out.push('(');
            }
            if uop.is_postfix() {
                print_subexp(operand, dialect, Prec::Postfix, out);
                out.push_str(uop.as_str());
            } else {
                out.push_str(uop.as_str());
                // avoid gluing `- -x` into `--x`
                if matches!(uop, UnaryOpcode::Neg | UnaryOpcode::Plus)
                    && starts_with_sign(operand)
                {
                    out.push(' ');
                }
                print_subexp(operand, dialect, Prec::Unary, out);
            }
            if needs {
                out.push(')');
            }
        }
        Operation::Binary { op: bop, left, right } => {
            let info = binary_op_info(*bop);
            let needs = required > info.prec;
            if needs {
                out.push('(');
            }
            print_subexp(left, dialect, info.prec, out);
            let _ = write!(out, " {} ", info.text);
            print_subexp(right, dialect, tighter(info.prec), out);
            if needs {
                out.push(')');
            }
        }
        Operation::Ternary {
            cond,
            then,
            otherwise,
        } => {
            let needs = required > Prec::Ternary;
            if needs {
                out.push('(');
            }
            print_subexp(cond, dialect, tighter(Prec::Ternary), out);
            out.push_str(" ? ");
            print_subexp(then, dialect, Prec::Assign, out);
            out.push_str(" : ");
            print_subexp(otherwise, dialect, Prec::Ternary, out);
            if needs {
                out.push(')');
            }
        }
        Operation::Assign { target, value } => {
            let needs = required > Prec::Assign;
            if needs {
                out.push('(');
            }
            print_subexp(target, dialect, tighter(Prec::Assign), out);
            out.push_str(" = ");
            print_subexp(value, dialect, Prec::Assign, out);
            if needs {
                out.push(')');
            }
        }
        Operation::AssignModify { op: bop, target, value } => {
            let needs = required > Prec::Assign;
            if needs {
                out.push('(');
            }
            print_subexp(target, dialect, tighter(Prec::Assign), out);
            let _ = write!(out, " {}= ", binary_op_info(*bop).text);
            print_subexp(value, dialect, Prec::Assign, out);
            if needs {
                out.push(')');
            }
        }
        Operation::Comma { left, right } => {
            let needs = required > Prec::Comma;
            if needs {
                out.push('(');
            }
            print_subexp(left, dialect, Prec::Comma, out);
            out.push_str(", ");
            print_subexp(right, dialect, Prec::Assign, out);
            if needs {
                out.push(')');
            }
        }

        Operation::Cast { ty, operand, .. } => {
            let needs = required > Prec::Unary;
            if needs {
                out.push('(');
            }
            let _ = write!(out, "({}) ", ty.display_name());
            print_subexp(operand, dialect, Prec::Unary, out);
            if needs {
                out.push(')');
            }
        }
        Operation::CastDerived {
            kind,
            type_source,
            operand,
        } => {
            let keyword = kind.keyword();
            if keyword.is_empty() {
                // expression-derived C cast
                out.push('(');
                print_subexp(type_source, dialect, Prec::Comma, out);
                out.push_str(") ");
                print_subexp(operand, dialect, Prec::Unary, out);
            } else {
                out.push_str(keyword);
                out.push('<');
                print_subexp(type_source, dialect, Prec::Comma, out);
                out.push_str(">(");
                print_subexp(operand, dialect, Prec::Comma, out);
                out.push(')');
            }
        }
        Operation::MemVal { ty, operand } => {
            let needs = required > Prec::Unary;
            if needs {
                out.push('(');
            }
            let _ = write!(out, "{{{}}} ", ty.display_name());
            print_subexp(operand, dialect, Prec::Unary, out);
            if needs {
                out.push(')');
            }
        }
        Operation::SizeOf { arg } => print_size_op("sizeof", arg, dialect, out),
        Operation::AlignOf { arg } => print_size_op("alignof", arg, dialect, out),

        Operation::Subscript { base, index } => {
            print_subexp(base, dialect, Prec::Postfix, out);
            out.push('[');
            print_subexp(index, dialect, Prec::Comma, out);
            out.push(']');
        }
        Operation::FieldAccess {
            base,
            field,
            through_pointer,
        } => {
            print_subexp(base, dialect, Prec::Postfix, out);
            out.push_str(if *through_pointer { "->" } else { "." });
            out.push_str(field);
        }
        Operation::ScopeAccess { ty, member } => {
            let _ = write!(out, "{}::{}", ty.display_name(), member);
        }
        Operation::Call { callee, args } => {
            print_subexp(callee, dialect, Prec::Postfix, out);
            out.push('(');
            for (i, a) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                print_subexp(a, dialect, Prec::Assign, out);
            }
            out.push(')');
        }
        Operation::ArrayLiteral { elements } => {
            out.push('{');
            for (i, e) in elements.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                print_subexp(e, dialect, Prec::Assign, out);
            }
            out.push('}');
        }

        Operation::Variable { symbol } => out.push_str(&symbol.name),
        Operation::NamedVariable { name } => out.push_str(name),
        Operation::SelfRef => {
            out.push_str(dialect.dialect().self_name().unwrap_or("this"));
        }
        Operation::TypeLiteral { ty } => out.push_str(&ty.display_name()),
        Operation::TypeInstance { name, args, .. } => {
            out.push_str(name);
            out.push('<');
            for (i, a) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&a.display_name());
            }
            out.push('>');
        }
        Operation::MessageSend {
            receiver,
            selector,
            args,
        } => {
            out.push('[');
            print_subexp(receiver, dialect, Prec::Ternary, out);
            if args.is_empty() {
                for part in selector {
                    out.push(' ');
                    out.push_str(part);
                }
            } else {
                for (part, arg) in selector.iter().zip(args) {
                    let _ = write!(out, " {}: ", part);
                    print_subexp(arg, dialect, Prec::Assign, out);
                }
            }
            out.push(']');
        }
    }
}

fn print_size_op(word: &str, arg: &SizeArg, dialect: DialectKind, out: &mut String) {
    out.push_str(word);
    out.push('(');
    match arg {
        SizeArg::Type(ty) => out.push_str(&ty.display_name()),
        SizeArg::Expr(e) => print_subexp(e, dialect, Prec::Comma, out),
    }
    out.push(')');
}

/// One step up the precedence ladder, for left-associative right
/// operands.
fn tighter(p: Prec) -> Prec {
    use Prec::*;
    match p {
        Comma => Assign,
        Assign => Ternary,
        Ternary => LogicalOr,
        LogicalOr => LogicalAnd,
        LogicalAnd => BitOr,
        BitOr => BitXor,
        BitXor => BitAnd,
        BitAnd => Equality,
        Equality => Relational,
        Relational => Shift,
        Shift => Additive,
        Additive => Multiplicative,
        Multiplicative => Unary,
        Unary => Postfix,
        Postfix | Primary => Primary,
    }
}

fn starts_with_sign(op: &Operation) -> bool {
    match op {
        Operation::Unary { op, .. } => matches!(
            op,
            UnaryOpcode::Neg | UnaryOpcode::Plus | UnaryOpcode::PreDec | UnaryOpcode::PreInc
        ),
        Operation::IntLiteral { value, .. } => *value < 0,
        _ => false,
    }
}

fn int_suffix(ty: &Type) -> &'static str {
    match ty.unqualified() {
        Type::Int { signed, name, .. } => {
            let long = name.contains("long");
            let ll = name.contains("long long");
            match (*signed, long, ll) {
                (true, false, _) => "",
                (false, false, _) => "u",
                (true, true, false) => "l",
                (false, true, false) => "ul",
                (true, true, true) => "ll",
                (false, true, true) => "ull",
            }
        }
        _ => "",
    }
}

fn float_suffix(ty: &Type) -> &'static str {
    match ty.unqualified() {
        Type::Float { bits: 32, .. } => "f",
        Type::DecimalFloat { bits, .. } => match bits {
            32 => "df",
            64 => "dd",
            _ => "dl",
        },
        _ => "",
    }
}

fn print_float(v: f64, out: &mut String) {
    if v == v.trunc() && v.is_finite() && v.abs() < 1e15 {
        let _ = write!(out, "{:.1}", v);
    } else {
        let _ = write!(out, "{}", v);
    }
}

fn push_char(value: i128, out: &mut String) {
    let c = u32::try_from(value as u32).ok().and_then(char::from_u32);
    match c {
        Some('\n') => out.push_str("\\n"),
        Some('\t') => out.push_str("\\t"),
        Some('\'') => out.push_str("\\'"),
        Some('\\') => out.push_str("\\\\"),
        Some(ch) if (' '..='~').contains(&ch) || !ch.is_ascii() => out.push(ch),
        _ => {
            let _ = write!(out, "\\{:o}", value & 0xff);
        }
    }
}

fn push_byte(b: u8, out: &mut String) {
    match b {
        b'\n' => out.push_str("\\n"),
        b'\t' => out.push_str("\\t"),
        b'"' => out.push_str("\\\""),
        b'\\' => out.push_str("\\\\"),
        0x20..=0x7e => out.push(b as char),
        _ => {
            let _ = write!(out, "\\{:o}", b);
        }
    }
}

/// Flat, position-indexed pre-order listing of every node.
pub fn dump(op: &Operation) -> String {
    let mut out = String::new();
    let mut index = 0usize;
    dump_node(op, &mut index, 0, &mut out);
    out
}

fn dump_node(op: &Operation, index: &mut usize, depth: usize, out: &mut String) {
    let _ = write!(out, "{:>4}  {}", index, "  ".repeat(depth));
    *index += 1;
    match op {
        Operation::IntLiteral { ty, value } => {
            let _ = writeln!(out, "IntLiteral {} ({})", value, ty.display_name());
        }
        Operation::FloatLiteral { ty, value } => {
            let _ = writeln!(out, "FloatLiteral {} ({})", value, ty.display_name());
        }
        Operation::ComplexLiteral { re, im, .. } => {
            let _ = writeln!(out, "ComplexLiteral {} + {}i", re, im);
        }
        Operation::BoolLiteral { value } => {
            let _ = writeln!(out, "BoolLiteral {}", value);
        }
        Operation::CharLiteral { value, .. } => {
            let _ = writeln!(out, "CharLiteral {}", value);
        }
        Operation::StringLiteral { bytes, .. } => {
            let _ = writeln!(out, "StringLiteral {} bytes", bytes.len());
        }
        Operation::Unary { op: uop, operand } => {
            let _ = writeln!(out, "Unary {:?}", uop);
            dump_node(operand, index, depth + 1, out);
        }
        Operation::Binary { op: bop, left, right } => {
            let _ = writeln!(out, "Binary {:?}", bop);
            dump_node(left, index, depth + 1, out);
            dump_node(right, index, depth + 1, out);
        }
        Operation::Ternary {
            cond,
            then,
            otherwise,
        } => {
            let _ = writeln!(out, "Ternary");
            dump_node(cond, index, depth + 1, out);
            dump_node(then, index, depth + 1, out);
            dump_node(otherwise, index, depth + 1, out);
        }
        Operation::Assign { target, value } => {
            let _ = writeln!(out, "Assign");
            dump_node(target, index, depth + 1, out);
            dump_node(value, index, depth + 1, out);
        }
        Operation::AssignModify { op: bop, target, value } => {
            let _ = writeln!(out, "AssignModify {:?}", bop);
            dump_node(target, index, depth + 1, out);
            dump_node(value, index, depth + 1, out);
        }
        Operation::Comma { left, right } => {
            let _ = writeln!(out, "Comma");
            dump_node(left, index, depth + 1, out);
            dump_node(right, index, depth + 1, out);
        }
        Operation::Cast { kind, ty, operand } => {
            let _ = writeln!(out, "Cast {:?} to {}", kind, ty.display_name());
            dump_node(operand, index, depth + 1, out);
        }
        Operation::CastDerived {
            kind,
            type_source,
            operand,
        } => {
            let _ = writeln!(out, "CastDerived {:?}", kind);
            dump_node(type_source, index, depth + 1, out);
            dump_node(operand, index, depth + 1, out);
        }
        Operation::MemVal { ty, operand } => {
            let _ = writeln!(out, "MemVal {}", ty.display_name());
            dump_node(operand, index, depth + 1, out);
        }
        Operation::SizeOf { arg } => {
            let _ = writeln!(out, "SizeOf");
            if let SizeArg::Expr(e) = arg {
                dump_node(e, index, depth + 1, out);
            }
        }
        Operation::AlignOf { arg } => {
            let _ = writeln!(out, "AlignOf");
            if let SizeArg::Expr(e) = arg {
                dump_node(e, index, depth + 1, out);
            }
        }
        Operation::Subscript { base, index: idx } => {
            let _ = writeln!(out, "Subscript");
            dump_node(base, index, depth + 1, out);
            dump_node(idx, index, depth + 1, out);
        }
        Operation::FieldAccess {
            base,
            field,
            through_pointer,
        } => {
            let _ = writeln!(
                out,
                "FieldAccess {}{}",
                if *through_pointer { "->" } else { "." },
                field
            );
            dump_node(base, index, depth + 1, out);
        }
        Operation::ScopeAccess { ty, member } => {
            let _ = writeln!(out, "ScopeAccess {}::{}", ty.display_name(), member);
        }
        Operation::Call { callee, args } => {
            let _ = writeln!(out, "Call ({} args)", args.len());
            dump_node(callee, index, depth + 1, out);
            for a in args {
                dump_node(a, index, depth + 1, out);
            }
        }
        Operation::ArrayLiteral { elements } => {
            let _ = writeln!(out, "ArrayLiteral ({} elements)", elements.len());
            for e in elements {
                dump_node(e, index, depth + 1, out);
            }
        }
        Operation::Variable { symbol } => {
            let _ = writeln!(out, "Variable {}", symbol.name);
        }
        Operation::NamedVariable { name } => {
            let _ = writeln!(out, "NamedVariable {}", name);
        }
        Operation::SelfRef => {
            let _ = writeln!(out, "SelfRef");
        }
        Operation::TypeLiteral { ty } => {
            let _ = writeln!(out, "TypeLiteral {}", ty.display_name());
        }
        Operation::TypeInstance { name, args, .. } => {
            let _ = writeln!(out, "TypeInstance {} ({} args)", name, args.len());
        }
        Operation::MessageSend {
            receiver,
            selector,
            args,
        } => {
            let _ = writeln!(out, "MessageSend {}", selector.join(":"));
            dump_node(receiver, index, depth + 1, out);
            for a in args {
                dump_node(a, index, depth + 1, out);
            }
        }
    }
}
