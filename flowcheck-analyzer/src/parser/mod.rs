use std::fmt::Write;
use std::str::FromStr;

use flowcheck_analyzer_error::{CompilerError, ErrorKind, Result};
use flowcheck_analyzer_ir::*;
use nom::{
    Finish, IResult,
    branch::alt,
    bytes::complete::{tag, take_while, take_while_m_n, take_while1},
    character::complete::{char, digit0, digit1, multispace1, one_of},
    combinator::{map, not, opt, recognize},
    error::{ErrorKind as NomErrorKind, ParseError, VerboseError, VerboseErrorKind},
    multi::many0,
    sequence::{pair, tuple},
};
use ordered_float::NotNan;
use rustc_hash::FxHashMap;
use vec_map::VecMap;

mod located;
mod name_table;

pub use located::LocatedStr;
use located::to_pos;
use name_table::NameTable;

use crate::span::Pos;

type PResult<'a, T> = IResult<LocatedStr<'a>, T, VerboseError<LocatedStr<'a>>>;

const IDENT_SYMBOLS: &str = "_.$-";

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || IDENT_SYMBOLS.contains(c)
}

fn failure<'a, T>(input: LocatedStr<'a>, context: &'static str) -> PResult<'a, T> {
    Err(nom::Err::Failure(VerboseError {
        errors: vec![(input, VerboseErrorKind::Context(context))],
    }))
}

fn mismatch<'a, T>(input: LocatedStr<'a>) -> PResult<'a, T> {
    Err(nom::Err::Error(VerboseError::from_error_kind(
        input,
        NomErrorKind::Tag,
    )))
}

fn space(input: LocatedStr<'_>) -> PResult<'_, ()> {
    map(multispace1, |_| ())(input)
}

fn line_comment(input: LocatedStr<'_>) -> PResult<'_, ()> {
    let (input, _) = tag(";")(input)?;
    let (input, _) = take_while(|c: char| c != '\n')(input)?;
    Ok((input, ()))
}

fn ws(input: LocatedStr<'_>) -> PResult<'_, ()> {
    let (input, _) = many0(alt((space, line_comment)))(input)?;
    Ok((input, ()))
}

fn sym<'a>(s: &'static str) -> impl FnMut(LocatedStr<'a>) -> PResult<'a, ()> {
    move |input| {
        let (input, _) = ws(input)?;
        let (input, _) = tag(s)(input)?;
        Ok((input, ()))
    }
}

fn keyword<'a>(kw: &'static str) -> impl FnMut(LocatedStr<'a>) -> PResult<'a, ()> {
    move |input| {
        let (input, _) = ws(input)?;
        let (input, _) = tag(kw)(input)?;
        let (input, _) = not(take_while1(is_ident_char))(input)?;
        Ok((input, ()))
    }
}

fn ident(input: LocatedStr<'_>) -> PResult<'_, &str> {
    let (input, s) = take_while1(is_ident_char)(input)?;
    Ok((input, *s.fragment()))
}

fn sigil_name<'a>(sigil: char) -> impl FnMut(LocatedStr<'a>) -> PResult<'a, (Pos, &'a str)> {
    move |input| {
        let (input, _) = ws(input)?;
        let pos = to_pos(&input);
        let (input, _) = char(sigil)(input)?;
        let (input, name) = ident(input)?;
        Ok((input, (pos, name)))
    }
}

fn local_ref(input: LocatedStr<'_>) -> PResult<'_, (Pos, &str)> {
    sigil_name('%')(input)
}

fn symbol_ref(input: LocatedStr<'_>) -> PResult<'_, (Pos, &str)> {
    sigil_name('@')(input)
}

fn label_def(input: LocatedStr<'_>) -> PResult<'_, (Pos, &str)> {
    let (input, _) = ws(input)?;
    let pos = to_pos(&input);
    let (input, name) = ident(input)?;
    let (input, _) = char(':')(input)?;
    Ok((input, (pos, name)))
}

fn u64_lit(input: LocatedStr<'_>) -> PResult<'_, u64> {
    let (input, _) = ws(input)?;
    let (rest, digits) = digit1(input)?;
    match digits.fragment().parse::<u64>() {
        Ok(n) => Ok((rest, n)),
        Err(_) => failure(input, "integer out of range"),
    }
}

fn int_lit(input: LocatedStr<'_>) -> PResult<'_, i64> {
    let (input, _) = ws(input)?;
    let (rest, digits) = recognize(pair(opt(char('-')), digit1))(input)?;
    match digits.fragment().parse::<i64>() {
        Ok(n) => Ok((rest, n)),
        Err(_) => failure(input, "integer out of range"),
    }
}

fn float_lit(input: LocatedStr<'_>) -> PResult<'_, NotNan<f64>> {
    let (input, _) = ws(input)?;
    // clangは10進で正確に表せない値を0x + 16桁のIEEE倍精度ビット列で出力する
    if let Ok((rest, _)) = tag::<_, _, VerboseError<LocatedStr<'_>>>("0x")(input) {
        let (rest, hex) = take_while_m_n(16, 16, |c: char| c.is_ascii_hexdigit())(rest)?;
        return match u64::from_str_radix(hex.fragment(), 16)
            .map(|bits| NotNan::new(f64::from_bits(bits)))
        {
            Ok(Ok(value)) => Ok((rest, value)),
            _ => failure(input, "invalid floating point literal"),
        };
    }
    let (rest, digits) = recognize(tuple((
        opt(one_of("+-")),
        digit1,
        opt(pair(char('.'), digit0)),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)?;
    match digits.fragment().parse::<f64>().map(NotNan::new) {
        Ok(Ok(value)) => Ok((rest, value)),
        _ => failure(input, "invalid floating point literal"),
    }
}

fn typ(input: LocatedStr<'_>) -> PResult<'_, Type> {
    let (input, _) = ws(input)?;
    if let Ok((input, _)) = sym("[")(input) {
        let (input, len) = u64_lit(input)?;
        let (input, _) = keyword("x")(input)?;
        let (input, elem) = typ(input)?;
        let (input, _) = sym("]")(input)?;
        return Ok((input, Type::Array(len, Box::new(elem))));
    }
    if let Ok((input, _)) = sym("<")(input) {
        let (input, len) = u64_lit(input)?;
        let (input, _) = keyword("x")(input)?;
        let (input, elem) = typ(input)?;
        let (input, _) = sym(">")(input)?;
        return Ok((input, Type::Vector(len, Box::new(elem))));
    }
    if let Ok((mut input, _)) = sym("{")(input) {
        let mut fields = Vec::new();
        if let Ok((rest, _)) = sym("}")(input) {
            return Ok((rest, Type::Struct(fields)));
        }
        loop {
            let (rest, field) = typ(input)?;
            fields.push(field);
            if let Ok((rest, _)) = sym(",")(rest) {
                input = rest;
                continue;
            }
            let (rest, _) = sym("}")(rest)?;
            return Ok((rest, Type::Struct(fields)));
        }
    }

    let (rest, word) = ident(input)?;
    let typ = match word {
        "void" => Type::Void,
        "half" => Type::Half,
        "float" => Type::Float,
        "double" => Type::Double,
        "ptr" => Type::Ptr,
        "label" => Type::Label,
        _ => match word.strip_prefix('i').map(u32::from_str) {
            Some(Ok(bits)) if bits > 0 => Type::Int(bits),
            _ => return mismatch(input),
        },
    };
    Ok((rest, typ))
}

fn is_anonymous(name: &str) -> bool {
    name.chars().all(|c| c.is_ascii_digit())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SymbolKind {
    Func(FuncId),
    Global(GlobalId),
}

#[derive(Debug, Default)]
struct FuncScope {
    locals: NameTable,
    local_types: FxHashMap<usize, Type>,
    labels: NameTable,
}

#[derive(Debug)]
struct ParsedBlock {
    id: usize,
    label: Option<String>,
    instrs: Vec<Instr>,
    next: TerminatorInstr,
}

enum Line {
    Instr(Instr),
    Terminator(TerminatorInstr),
}

#[derive(Debug, Default)]
struct ModuleParser {
    // 関数とグローバルは同じ@の名前空間を共有する
    symbols: NameTable,
    kinds: FxHashMap<usize, SymbolKind>,
    module: Module,
    errors: Vec<CompilerError>,
}

impl ModuleParser {
    fn record<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.errors.push(e);
                None
            }
        }
    }

    fn define_symbol(&mut self, name: &str, pos: Pos, kind: SymbolKind) {
        let result = self.symbols.define(name, pos, "@");
        if let Some(id) = self.record(result) {
            self.kinds.insert(id, kind);
        }
    }

    fn define_local(&mut self, scope: &mut FuncScope, name: &str, pos: Pos, typ: Type) -> LocalId {
        let result = scope.locals.define(name, pos, "%");
        let id = self
            .record(result)
            .unwrap_or_else(|| scope.locals.reference(name, pos));
        scope.local_types.insert(id, typ);
        LocalId::from(id)
    }

    fn label_ref<'a>(&mut self, scope: &mut FuncScope, input: LocatedStr<'a>) -> PResult<'a, BasicBlockId> {
        let (input, _) = keyword("label")(input)?;
        let (input, (pos, name)) = local_ref(input)?;
        Ok((input, BasicBlockId::from(scope.labels.reference(name, pos))))
    }

    // 関数やグローバルへの参照はいったん仮のidでOperand::Funcに入れておき、finishで解決する
    fn value<'a>(
        &mut self,
        scope: &mut FuncScope,
        typ: &Type,
        input: LocatedStr<'a>,
    ) -> PResult<'a, Operand> {
        let (input, _) = ws(input)?;
        if let Ok((rest, (pos, name))) = local_ref(input) {
            let id = scope.locals.reference(name, pos);
            return Ok((rest, Operand::Local(LocalId::from(id))));
        }
        if let Ok((rest, (pos, name))) = symbol_ref(input) {
            let id = self.symbols.reference(name, pos);
            return Ok((rest, Operand::Func(FuncId::from(id))));
        }
        if let Ok((rest, word)) = ident(input) {
            let constant = match word {
                "null" => Some(Constant::Null),
                "undef" => Some(Constant::Undef(typ.clone())),
                "true" => Some(Constant::int(1, 1)),
                "false" => Some(Constant::int(1, 0)),
                _ => None,
            };
            if let Some(constant) = constant {
                return Ok((rest, Operand::Const(constant)));
            }
        }
        match typ {
            _ if typ.is_float() => {
                let (rest, value) = float_lit(input)?;
                Ok((
                    rest,
                    Operand::Const(Constant::Float {
                        typ: typ.clone(),
                        value,
                    }),
                ))
            }
            Type::Int(bits) => {
                let (rest, value) = int_lit(input)?;
                Ok((rest, Operand::Const(Constant::int(*bits, value))))
            }
            _ => mismatch(input),
        }
    }

    fn typed_value<'a>(
        &mut self,
        scope: &mut FuncScope,
        input: LocatedStr<'a>,
    ) -> PResult<'a, (Type, Operand)> {
        let (input, t) = typ(input)?;
        let (input, v) = self.value(scope, &t, input)?;
        Ok((input, (t, v)))
    }

    fn typed_operand<'a>(&mut self, scope: &mut FuncScope, input: LocatedStr<'a>) -> PResult<'a, Operand> {
        let (input, (_, v)) = self.typed_value(scope, input)?;
        Ok((input, v))
    }

    fn comma_then<'a, T>(
        &mut self,
        scope: &mut FuncScope,
        input: LocatedStr<'a>,
        mut f: impl FnMut(&mut Self, &mut FuncScope, LocatedStr<'a>) -> PResult<'a, T>,
    ) -> PResult<'a, T> {
        let (input, _) = sym(",")(input)?;
        f(self, scope, input)
    }

    fn indices<'a>(&mut self, mut input: LocatedStr<'a>) -> PResult<'a, Vec<u32>> {
        let mut indices = Vec::new();
        while let Ok((rest, _)) = sym(",")(input) {
            let (rest, index) = u64_lit(rest)?;
            match u32::try_from(index) {
                Ok(index) => indices.push(index),
                Err(_) => return failure(input, "aggregate index out of range"),
            }
            input = rest;
        }
        if indices.is_empty() {
            return failure(input, "expected aggregate index");
        }
        Ok((input, indices))
    }

    fn line<'a>(&mut self, scope: &mut FuncScope, input: LocatedStr<'a>) -> PResult<'a, Line> {
        let (input, result) = match local_ref(input) {
            Ok((rest, (pos, name))) => {
                let (rest, _) = sym("=")(rest)?;
                (rest, Some((pos, name)))
            }
            Err(_) => (input, None),
        };
        let (input, _) = ws(input)?;
        let op_input = input;
        let (input, word) = ident(input)?;

        let (input, kind, result_type) = match word {
            "alloca" => {
                let (input, t) = typ(input)?;
                (input, InstrKind::Alloca(t), Some(Type::Ptr))
            }
            "load" => {
                let (input, t) = typ(input)?;
                let (input, ptr) = self.comma_then(scope, input, Self::typed_operand)?;
                (
                    input,
                    InstrKind::Load {
                        typ: t.clone(),
                        ptr,
                    },
                    Some(t),
                )
            }
            "store" => {
                let (input, value) = self.typed_operand(scope, input)?;
                let (input, ptr) = self.comma_then(scope, input, Self::typed_operand)?;
                (input, InstrKind::Store { value, ptr }, None)
            }
            "icmp" | "fcmp" => {
                let (input, _) = ws(input)?;
                let (input, pred) = ident(input)?;
                let (input, t) = typ(input)?;
                let (input, lhs) = self.value(scope, &t, input)?;
                let (input, _) = sym(",")(input)?;
                let (input, rhs) = self.value(scope, &t, input)?;
                let kind = if word == "icmp" {
                    match ICmpPred::from_str(pred) {
                        Ok(pred) => InstrKind::ICmp {
                            pred,
                            typ: t,
                            lhs,
                            rhs,
                        },
                        Err(_) => return failure(op_input, "unknown icmp predicate"),
                    }
                } else {
                    match FCmpPred::from_str(pred) {
                        Ok(pred) => InstrKind::FCmp {
                            pred,
                            typ: t,
                            lhs,
                            rhs,
                        },
                        Err(_) => return failure(op_input, "unknown fcmp predicate"),
                    }
                };
                (input, kind, Some(Type::I1))
            }
            "phi" => {
                let (mut input, t) = typ(input)?;
                let mut incoming = Vec::new();
                loop {
                    let (rest, _) = sym("[")(input)?;
                    let (rest, value) = self.value(scope, &t, rest)?;
                    let (rest, _) = sym(",")(rest)?;
                    let (rest, (pos, name)) = local_ref(rest)?;
                    let (rest, _) = sym("]")(rest)?;
                    incoming.push((value, BasicBlockId::from(scope.labels.reference(name, pos))));
                    input = rest;
                    match sym(",")(input) {
                        Ok((rest, _)) => input = rest,
                        Err(_) => break,
                    }
                }
                (input, InstrKind::Phi { typ: t.clone(), incoming }, Some(t))
            }
            "select" => {
                let (input, cond) = self.typed_operand(scope, input)?;
                let (input, (t, then_value)) = self.comma_then(scope, input, Self::typed_value)?;
                let (input, else_value) = self.comma_then(scope, input, Self::typed_operand)?;
                (
                    input,
                    InstrKind::Select {
                        cond,
                        then_value,
                        else_value,
                    },
                    Some(t),
                )
            }
            "getelementptr" => {
                let (input, _) = opt(keyword("inbounds"))(input)?;
                let (input, t) = typ(input)?;
                let (mut input, ptr) = self.comma_then(scope, input, Self::typed_operand)?;
                let mut indices = Vec::new();
                while let Ok((rest, _)) = sym(",")(input) {
                    let (rest, index) = self.typed_operand(scope, rest)?;
                    indices.push(index);
                    input = rest;
                }
                (
                    input,
                    InstrKind::GetElementPtr {
                        typ: t,
                        ptr,
                        indices,
                    },
                    Some(Type::Ptr),
                )
            }
            "extractvalue" => {
                let (input, (t, aggregate)) = self.typed_value(scope, input)?;
                let (input, indices) = self.indices(input)?;
                let mut field = Some(&t);
                for &index in &indices {
                    field = field.and_then(|t| t.aggregate_field(index));
                }
                let Some(field) = field.cloned() else {
                    return failure(op_input, "invalid aggregate index");
                };
                (
                    input,
                    InstrKind::ExtractValue { aggregate, indices },
                    Some(field),
                )
            }
            "insertvalue" => {
                let (input, (t, aggregate)) = self.typed_value(scope, input)?;
                let (input, value) = self.comma_then(scope, input, Self::typed_operand)?;
                let (input, indices) = self.indices(input)?;
                (
                    input,
                    InstrKind::InsertValue {
                        aggregate,
                        value,
                        indices,
                    },
                    Some(t),
                )
            }
            "extractelement" => {
                let (input, (t, vector)) = self.typed_value(scope, input)?;
                let (input, index) = self.comma_then(scope, input, Self::typed_operand)?;
                let Some(elem) = t.vector_element().cloned() else {
                    return failure(op_input, "extractelement requires a vector");
                };
                (input, InstrKind::ExtractElement { vector, index }, Some(elem))
            }
            "insertelement" => {
                let (input, (t, vector)) = self.typed_value(scope, input)?;
                let (input, value) = self.comma_then(scope, input, Self::typed_operand)?;
                let (input, index) = self.comma_then(scope, input, Self::typed_operand)?;
                (
                    input,
                    InstrKind::InsertElement {
                        vector,
                        value,
                        index,
                    },
                    Some(t),
                )
            }
            "call" => {
                let (input, ret_type) = typ(input)?;
                let (input, callee) = self.value(scope, &Type::Ptr, input)?;
                let (mut input, _) = sym("(")(input)?;
                let mut args = Vec::new();
                if let Ok((rest, _)) = sym(")")(input) {
                    input = rest;
                } else {
                    loop {
                        let (rest, arg) = self.typed_operand(scope, input)?;
                        args.push(arg);
                        if let Ok((rest, _)) = sym(",")(rest) {
                            input = rest;
                            continue;
                        }
                        let (rest, _) = sym(")")(rest)?;
                        input = rest;
                        break;
                    }
                }
                let result_type = (!ret_type.is_void()).then(|| ret_type.clone());
                (
                    input,
                    InstrKind::Call(InstrCall {
                        ret_type,
                        callee,
                        args,
                    }),
                    result_type,
                )
            }
            "br" | "switch" | "indirectbr" | "ret" | "unreachable" => {
                if result.is_some() {
                    return failure(op_input, "terminator does not produce a value");
                }
                let (input, terminator) = self.terminator(scope, word, input)?;
                return Ok((input, Line::Terminator(terminator)));
            }
            _ => {
                if let Ok(op) = BinOpKind::from_str(word) {
                    let (input, t) = typ(input)?;
                    let (input, lhs) = self.value(scope, &t, input)?;
                    let (input, _) = sym(",")(input)?;
                    let (input, rhs) = self.value(scope, &t, input)?;
                    (
                        input,
                        InstrKind::BinOp {
                            op,
                            typ: t.clone(),
                            lhs,
                            rhs,
                        },
                        Some(t),
                    )
                } else if let Ok(op) = CastOp::from_str(word) {
                    let (input, value) = self.typed_operand(scope, input)?;
                    let (input, _) = keyword("to")(input)?;
                    let (input, to) = typ(input)?;
                    (
                        input,
                        InstrKind::Cast {
                            op,
                            value,
                            to: to.clone(),
                        },
                        Some(to),
                    )
                } else {
                    return failure(op_input, "unknown instruction");
                }
            }
        };

        let local = match (result, result_type) {
            (Some((pos, name)), Some(t)) => Some(self.define_local(scope, name, pos, t)),
            (Some(_), None) => return failure(op_input, "instruction does not produce a value"),
            (None, _) => None,
        };
        Ok((input, Line::Instr(Instr { local, kind })))
    }

    fn terminator<'a>(
        &mut self,
        scope: &mut FuncScope,
        word: &str,
        input: LocatedStr<'a>,
    ) -> PResult<'a, TerminatorInstr> {
        match word {
            "br" => {
                if let Ok((input, bb)) = self.label_ref(scope, input) {
                    return Ok((input, TerminatorInstr::Br(bb)));
                }
                let (input, cond) = self.typed_operand(scope, input)?;
                let (input, then_bb) = self.comma_then(scope, input, Self::label_ref)?;
                let (input, else_bb) = self.comma_then(scope, input, Self::label_ref)?;
                Ok((
                    input,
                    TerminatorInstr::CondBr {
                        cond,
                        then_bb,
                        else_bb,
                    },
                ))
            }
            "switch" => {
                let (input, value) = self.typed_operand(scope, input)?;
                let (input, default) = self.comma_then(scope, input, Self::label_ref)?;
                let (mut input, _) = sym("[")(input)?;
                let mut cases = Vec::new();
                while sym("]")(input).is_err() {
                    let (rest, case) = self.typed_operand(scope, input)?;
                    let Operand::Const(case) = case else {
                        return failure(input, "switch case must be a constant");
                    };
                    let (rest, bb) = self.comma_then(scope, rest, Self::label_ref)?;
                    cases.push((case, bb));
                    input = rest;
                }
                let (input, _) = sym("]")(input)?;
                Ok((
                    input,
                    TerminatorInstr::Switch {
                        value,
                        default,
                        cases,
                    },
                ))
            }
            "indirectbr" => {
                let (input, addr) = self.typed_operand(scope, input)?;
                let (input, _) = sym(",")(input)?;
                let (mut input, _) = sym("[")(input)?;
                let mut dests = Vec::new();
                while sym("]")(input).is_err() {
                    if !dests.is_empty() {
                        input = sym(",")(input)?.0;
                    }
                    let (rest, bb) = self.label_ref(scope, input)?;
                    dests.push(bb);
                    input = rest;
                }
                let (input, _) = sym("]")(input)?;
                Ok((input, TerminatorInstr::IndirectBr { addr, dests }))
            }
            "ret" => {
                if let Ok((input, _)) = keyword("void")(input) {
                    return Ok((input, TerminatorInstr::Ret(None)));
                }
                let (input, value) = self.typed_operand(scope, input)?;
                Ok((input, TerminatorInstr::Ret(Some(value))))
            }
            _ => Ok((input, TerminatorInstr::Unreachable)),
        }
    }

    fn params<'a>(
        &mut self,
        input: LocatedStr<'a>,
    ) -> PResult<'a, (Vec<(Type, Option<(Pos, &'a str)>)>, bool)> {
        let (mut input, _) = sym("(")(input)?;
        let mut params = Vec::new();
        let mut variadic = false;
        if let Ok((rest, _)) = sym(")")(input) {
            return Ok((rest, (params, variadic)));
        }
        loop {
            if let Ok((rest, _)) = sym("...")(input) {
                variadic = true;
                input = rest;
            } else {
                let (rest, t) = typ(input)?;
                let (rest, name) = opt(local_ref)(rest)?;
                params.push((t, name));
                input = rest;
            }
            if !variadic && let Ok((rest, _)) = sym(",")(input) {
                input = rest;
                continue;
            }
            let (rest, _) = sym(")")(input)?;
            return Ok((rest, (params, variadic)));
        }
    }

    fn declare<'a>(&mut self, input: LocatedStr<'a>) -> PResult<'a, ()> {
        let (input, _) = keyword("declare")(input)?;
        let (input, ret_type) = typ(input)?;
        let (input, (pos, name)) = symbol_ref(input)?;
        let (input, (params, variadic)) = self.params(input)?;

        let mut locals = VecMap::new();
        let params = params
            .into_iter()
            .map(|(typ, _)| {
                locals.push_with(|id| Local {
                    id,
                    typ,
                    name: None,
                })
            })
            .collect();
        let func_id = self.module.funcs.push_with(|id| Func {
            id,
            name: name.to_string(),
            ret_type,
            params,
            variadic,
            locals,
            bbs: VecMap::new(),
        });
        self.define_symbol(name, pos, SymbolKind::Func(func_id));
        Ok((input, ()))
    }

    fn define<'a>(&mut self, input: LocatedStr<'a>) -> PResult<'a, ()> {
        let (input, _) = keyword("define")(input)?;
        let (input, ret_type) = typ(input)?;
        let (input, (pos, name)) = symbol_ref(input)?;
        let (input, (params, variadic)) = self.params(input)?;
        let (mut input, _) = sym("{")(input)?;

        let mut scope = FuncScope::default();
        let mut param_ids = Vec::new();
        for (i, (typ, param_name)) in params.into_iter().enumerate() {
            // 名前のない引数はLLVMと同じく%0, %1, ...
            let (pos, param_name) = match param_name {
                Some((pos, param_name)) => (pos, param_name.to_string()),
                None => (pos, i.to_string()),
            };
            param_ids.push(self.define_local(&mut scope, &param_name, pos, typ));
        }

        let mut blocks = Vec::new();
        let mut current: Option<(usize, Option<String>, Vec<Instr>)> = None;
        loop {
            let (rest, _) = ws(input)?;
            if let Ok((rest, _)) = sym("}")(rest) {
                if current.is_some() {
                    return failure(rest, "block must end with a terminator");
                }
                input = rest;
                break;
            }
            if let Ok((rest, (label_pos, label))) = label_def(rest) {
                if current.is_some() {
                    return failure(input, "block must end with a terminator");
                }
                let result = scope.labels.define(label, label_pos, "%");
                let id = self
                    .record(result)
                    .unwrap_or_else(|| scope.labels.reference(label, label_pos));
                current = Some((id, Some(label.to_string()), Vec::new()));
                input = rest;
                continue;
            }
            if current.is_none() {
                if !blocks.is_empty() {
                    return failure(rest, "expected label");
                }
                // ラベルのない先頭ブロック
                let id = scope.labels.reference("", to_pos(&rest));
                let result = scope.labels.define("", to_pos(&rest), "%");
                self.record(result);
                current = Some((id, None, Vec::new()));
            }
            let (rest, line) = self.line(&mut scope, rest)?;
            input = rest;
            match line {
                Line::Instr(instr) => {
                    if let Some((_, _, instrs)) = current.as_mut() {
                        instrs.push(instr);
                    }
                }
                Line::Terminator(next) => {
                    if let Some((id, label, instrs)) = current.take() {
                        blocks.push(ParsedBlock {
                            id,
                            label,
                            instrs,
                            next,
                        });
                    }
                }
            }
        }
        if blocks.is_empty() {
            return failure(input, "function body must have at least one block");
        }

        if let Some(func) = self.build_func(name, ret_type, param_ids, variadic, scope, blocks) {
            let func_id = self.module.funcs.push_with(|id| Func { id, ..func });
            self.define_symbol(name, pos, SymbolKind::Func(func_id));
        }
        Ok((input, ()))
    }

    // 仮のidを定義順のidに振り直す
    fn build_func(
        &mut self,
        name: &str,
        ret_type: Type,
        param_ids: Vec<LocalId>,
        variadic: bool,
        scope: FuncScope,
        blocks: Vec<ParsedBlock>,
    ) -> Option<Func> {
        let local_order = scope.locals.finish("value", "%");
        let local_order = self.record(local_order)?;
        let label_order = scope.labels.finish("label", "%");
        let label_order = self.record(label_order)?;

        let mut local_map = vec![LocalId::from(0); local_order.len()];
        let mut locals = VecMap::new();
        for (i, &prov) in local_order.iter().enumerate() {
            let id = LocalId::from(i);
            local_map[prov] = id;
            let local_name = scope.locals.name(prov);
            locals.insert_node(Local {
                id,
                typ: scope.local_types.get(&prov).cloned().unwrap_or(Type::Void),
                name: (!is_anonymous(local_name)).then(|| local_name.to_string()),
            });
        }
        let mut bb_map = vec![BasicBlockId::from(0); label_order.len()];
        for (i, &prov) in label_order.iter().enumerate() {
            bb_map[prov] = BasicBlockId::from(i);
        }

        let mut bbs = VecMap::new();
        for block in blocks {
            let mut bb = BasicBlock {
                id: bb_map[block.id],
                label: block.label,
                instrs: block.instrs,
                next: block.next,
            };
            for instr in bb.instrs.iter_mut() {
                if let Some(local) = instr.local.as_mut() {
                    *local = local_map[usize::from(*local)];
                }
            }
            for operand in bb.operands_mut() {
                if let Operand::Local(local) = operand {
                    *local = local_map[usize::from(*local)];
                }
            }
            for target in bb.bb_ids_mut() {
                *target = bb_map[usize::from(*target)];
            }
            bbs.insert_node(bb);
        }

        Some(Func {
            id: FuncId::from(0),
            name: name.to_string(),
            ret_type,
            params: param_ids
                .into_iter()
                .map(|param| local_map[usize::from(param)])
                .collect(),
            variadic,
            locals,
            bbs,
        })
    }

    fn global<'a>(&mut self, input: LocatedStr<'a>) -> PResult<'a, ()> {
        let (input, (pos, name)) = symbol_ref(input)?;
        let (input, _) = sym("=")(input)?;
        let (input, external) = opt(keyword("external"))(input)?;
        let external = external.is_some();
        let (input, _) = keyword("global")(input)?;
        let (input, t) = typ(input)?;
        let (input, init) = if external {
            (input, None)
        } else {
            let mut scope = FuncScope::default();
            let (rest, init) = self.value(&mut scope, &t, input)?;
            if !scope.locals.is_empty() {
                return failure(input, "global initializer must be a constant");
            }
            (rest, Some(init))
        };
        let global_id = self.module.globals.push_with(|id| Global {
            id,
            name: name.to_string(),
            typ: t,
            init,
            external,
        });
        self.define_symbol(name, pos, SymbolKind::Global(global_id));
        Ok((input, ()))
    }

    fn items<'a>(&mut self, mut input: LocatedStr<'a>) -> PResult<'a, ()> {
        loop {
            let (rest, _) = ws(input)?;
            if rest.fragment().is_empty() {
                return Ok((rest, ()));
            }
            input = if keyword("define")(rest).is_ok() {
                self.define(rest)?.0
            } else if keyword("declare")(rest).is_ok() {
                self.declare(rest)?.0
            } else if symbol_ref(rest).is_ok() {
                self.global(rest)?.0
            } else {
                return failure(rest, "expected global, declare or define");
            };
        }
    }

    fn finish(self) -> Result<Module> {
        if let Some(e) = self.errors.into_iter().next() {
            return Err(e);
        }
        self.symbols.finish("symbol", "@")?;

        let kinds = self.kinds;
        let mut module = self.module;
        for operand in module.operands_mut() {
            if let Operand::Func(prov) = operand {
                *operand = match kinds.get(&usize::from(*prov)) {
                    Some(SymbolKind::Func(id)) => Operand::Func(*id),
                    Some(SymbolKind::Global(id)) => Operand::Global(*id),
                    None => continue,
                };
            }
        }
        Ok(module)
    }
}

fn convert_error(e: VerboseError<LocatedStr>) -> CompilerError {
    let mut result = String::new();

    for (substring, kind) in e.errors.iter() {
        let pos = to_pos(substring);
        let found = substring
            .fragment()
            .split_whitespace()
            .next()
            .unwrap_or("end of input");

        let _ = match kind {
            VerboseErrorKind::Char(c) => {
                writeln!(result, "{}: expected '{}', found {}", pos, c, found)
            }
            VerboseErrorKind::Context(s) => writeln!(result, "{}: {}, found {}", pos, s, found),
            VerboseErrorKind::Nom(e) => writeln!(result, "{}: unexpected {} ({:?})", pos, found, e),
        };
    }

    CompilerError::new(ErrorKind::Parse, result.trim_end())
}

pub fn parse_module(input: &str) -> Result<Module> {
    let mut parser = ModuleParser::default();
    let input = LocatedStr::new(input);
    parser.items(input).finish().map_err(convert_error)?;
    let module = parser.finish()?;
    log::debug!(
        "parsed {} functions and {} globals",
        module.funcs.len(),
        module.globals.len()
    );
    Ok(module)
}
