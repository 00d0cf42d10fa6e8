use std::fmt;

use super::id::*;
use super::instr::*;
use super::ir::*;
use super::operand::*;

pub const DISPLAY_INDENT: &str = "  ";

#[derive(Debug, Clone, Copy)]
pub struct DisplayCtx<'a> {
    pub module: &'a Module,
    pub func: Option<&'a Func>,
}

impl<'a> DisplayCtx<'a> {
    pub fn new(module: &'a Module) -> Self {
        Self { module, func: None }
    }

    pub fn in_func(self, func: &'a Func) -> Self {
        Self {
            module: self.module,
            func: Some(func),
        }
    }

    fn wrap<T>(self, value: T) -> Display<'a, T> {
        Display { value, ctx: self }
    }

    fn bb_label(&self, bb_id: BasicBlockId) -> String {
        self.func
            .and_then(|func| func.bbs.get(bb_id))
            .and_then(|bb| bb.label.clone())
            .unwrap_or_else(|| bb_id.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct Display<'a, T> {
    pub value: T,
    pub ctx: DisplayCtx<'a>,
}

// 型付きで表示するオペランド (例: i32 %x)
#[derive(Debug, Clone, Copy)]
pub struct Typed<'a>(pub &'a Operand);

impl Module {
    pub fn display(&self) -> Display<'_, &Module> {
        DisplayCtx::new(self).wrap(self)
    }
}

impl Func {
    pub fn display<'a>(&'a self, module: &'a Module) -> Display<'a, &'a Func> {
        DisplayCtx::new(module).in_func(self).wrap(self)
    }
}

impl Operand {
    pub fn display<'a>(&'a self, ctx: DisplayCtx<'a>) -> Display<'a, &'a Operand> {
        ctx.wrap(self)
    }
}

impl fmt::Display for Display<'_, &Module> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for global in self.value.globals.values() {
            writeln!(f, "{}", self.ctx.wrap(global))?;
            first = false;
        }
        for func in self.value.funcs.values() {
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(f, "{}", self.ctx.in_func(func).wrap(func))?;
        }
        Ok(())
    }
}

impl fmt::Display for Display<'_, &Global> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let global = self.value;
        if global.external {
            return write!(f, "@{} = external global {}", global.name, global.typ);
        }
        write!(f, "@{} = global {}", global.name, global.typ)?;
        if let Some(init) = &global.init {
            write!(f, " {}", self.ctx.wrap(init))?;
        }
        Ok(())
    }
}

impl fmt::Display for Display<'_, &Func> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let func = self.value;
        let keyword = if func.is_declaration() {
            "declare"
        } else {
            "define"
        };
        write!(f, "{} {} @{}(", keyword, func.ret_type, func.name)?;
        for (i, &param) in func.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if func.is_declaration() {
                write!(f, "{}", func.locals[param].typ)?;
            } else {
                write!(f, "{}", self.ctx.wrap(Typed(&Operand::Local(param))))?;
            }
        }
        if func.variadic {
            if !func.params.is_empty() {
                write!(f, ", ")?;
            }
            write!(f, "...")?;
        }
        write!(f, ")")?;
        if func.is_declaration() {
            return writeln!(f);
        }
        writeln!(f, " {{")?;
        for bb in func.bbs.values() {
            write!(f, "{}", self.ctx.wrap(bb))?;
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for Display<'_, &BasicBlock> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.ctx.bb_label(self.value.id))?;
        for instr in &self.value.instrs {
            writeln!(f, "{}{}", DISPLAY_INDENT, self.ctx.wrap(instr))?;
        }
        writeln!(f, "{}{}", DISPLAY_INDENT, self.ctx.wrap(&self.value.next))
    }
}

impl fmt::Display for Display<'_, &Operand> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Operand::Local(id) => match self.ctx.func.and_then(|func| func.local_name(*id)) {
                Some(name) => write!(f, "%{}", name),
                None => write!(f, "%{}", usize::from(*id)),
            },
            Operand::Global(id) => match self.ctx.module.globals.get(*id) {
                Some(global) => write!(f, "@{}", global.name),
                None => write!(f, "@g{}", usize::from(*id)),
            },
            Operand::Func(id) => match self.ctx.module.funcs.get(*id) {
                Some(func) => write!(f, "@{}", func.name),
                None => write!(f, "@{}", id),
            },
            Operand::Const(c) => write!(f, "{}", c),
        }
    }
}

impl fmt::Display for Display<'_, Typed<'_>> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let operand = self.value.0;
        let typ = match (self.ctx.func, operand) {
            (Some(func), _) => func.operand_type(operand),
            (None, Operand::Const(c)) => c.typ(),
            (None, _) => super::typ::Type::Ptr,
        };
        write!(f, "{} {}", typ, self.ctx.wrap(operand))
    }
}

impl Display<'_, &Instr> {
    fn write_typed_list(&self, f: &mut fmt::Formatter<'_>, operands: &[Operand]) -> fmt::Result {
        for (i, operand) in operands.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", self.ctx.wrap(Typed(operand)))?;
        }
        Ok(())
    }
}

impl fmt::Display for Display<'_, &Instr> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ctx = self.ctx;
        if let Some(local) = self.value.local {
            write!(f, "{} = ", ctx.wrap(&Operand::Local(local)))?;
        }
        match &self.value.kind {
            InstrKind::Alloca(typ) => write!(f, "alloca {}", typ),
            InstrKind::Store { value, ptr } => write!(
                f,
                "store {}, {}",
                ctx.wrap(Typed(value)),
                ctx.wrap(Typed(ptr))
            ),
            InstrKind::Load { typ, ptr } => {
                write!(f, "load {}, {}", typ, ctx.wrap(Typed(ptr)))
            }
            InstrKind::BinOp { op, typ, lhs, rhs } => write!(
                f,
                "{} {} {}, {}",
                op,
                typ,
                ctx.wrap(lhs),
                ctx.wrap(rhs)
            ),
            InstrKind::ICmp {
                pred,
                typ,
                lhs,
                rhs,
            } => write!(
                f,
                "icmp {} {} {}, {}",
                pred,
                typ,
                ctx.wrap(lhs),
                ctx.wrap(rhs)
            ),
            InstrKind::FCmp {
                pred,
                typ,
                lhs,
                rhs,
            } => write!(
                f,
                "fcmp {} {} {}, {}",
                pred,
                typ,
                ctx.wrap(lhs),
                ctx.wrap(rhs)
            ),
            InstrKind::Cast { op, value, to } => {
                write!(f, "{} {} to {}", op, ctx.wrap(Typed(value)), to)
            }
            InstrKind::Phi { typ, incoming } => {
                write!(f, "phi {}", typ)?;
                for (i, (value, bb)) in incoming.iter().enumerate() {
                    let sep = if i > 0 { "," } else { "" };
                    write!(f, "{} [ {}, %{} ]", sep, ctx.wrap(value), ctx.bb_label(*bb))?;
                }
                Ok(())
            }
            InstrKind::Select {
                cond,
                then_value,
                else_value,
            } => write!(
                f,
                "select {}, {}, {}",
                ctx.wrap(Typed(cond)),
                ctx.wrap(Typed(then_value)),
                ctx.wrap(Typed(else_value))
            ),
            InstrKind::GetElementPtr { typ, ptr, indices } => {
                write!(f, "getelementptr {}, {}", typ, ctx.wrap(Typed(ptr)))?;
                for index in indices {
                    write!(f, ", {}", ctx.wrap(Typed(index)))?;
                }
                Ok(())
            }
            InstrKind::ExtractValue { aggregate, indices } => {
                write!(f, "extractvalue {}", ctx.wrap(Typed(aggregate)))?;
                for index in indices {
                    write!(f, ", {}", index)?;
                }
                Ok(())
            }
            InstrKind::InsertValue {
                aggregate,
                value,
                indices,
            } => {
                write!(
                    f,
                    "insertvalue {}, {}",
                    ctx.wrap(Typed(aggregate)),
                    ctx.wrap(Typed(value))
                )?;
                for index in indices {
                    write!(f, ", {}", index)?;
                }
                Ok(())
            }
            InstrKind::ExtractElement { vector, index } => write!(
                f,
                "extractelement {}, {}",
                ctx.wrap(Typed(vector)),
                ctx.wrap(Typed(index))
            ),
            InstrKind::InsertElement {
                vector,
                value,
                index,
            } => write!(
                f,
                "insertelement {}, {}, {}",
                ctx.wrap(Typed(vector)),
                ctx.wrap(Typed(value)),
                ctx.wrap(Typed(index))
            ),
            InstrKind::Call(call) => {
                write!(f, "call {} {}(", call.ret_type, ctx.wrap(&call.callee))?;
                self.write_typed_list(f, &call.args)?;
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Display<'_, &TerminatorInstr> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ctx = self.ctx;
        match self.value {
            TerminatorInstr::Br(bb) => write!(f, "br label %{}", ctx.bb_label(*bb)),
            TerminatorInstr::CondBr {
                cond,
                then_bb,
                else_bb,
            } => write!(
                f,
                "br {}, label %{}, label %{}",
                ctx.wrap(Typed(cond)),
                ctx.bb_label(*then_bb),
                ctx.bb_label(*else_bb)
            ),
            TerminatorInstr::Switch {
                value,
                default,
                cases,
            } => {
                write!(
                    f,
                    "switch {}, label %{} [",
                    ctx.wrap(Typed(value)),
                    ctx.bb_label(*default)
                )?;
                for (i, (case, bb)) in cases.iter().enumerate() {
                    let sep = if i > 0 { " " } else { "" };
                    write!(f, "{}{} {}, label %{}", sep, case.typ(), case, ctx.bb_label(*bb))?;
                }
                write!(f, "]")
            }
            TerminatorInstr::IndirectBr { addr, dests } => {
                write!(f, "indirectbr {}, [", ctx.wrap(Typed(addr)))?;
                for (i, bb) in dests.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "label %{}", ctx.bb_label(*bb))?;
                }
                write!(f, "]")
            }
            TerminatorInstr::Ret(None) => write!(f, "ret void"),
            TerminatorInstr::Ret(Some(value)) => write!(f, "ret {}", ctx.wrap(Typed(value))),
            TerminatorInstr::Unreachable => write!(f, "unreachable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typ::Type;
    use vec_map::VecMap;

    fn local(id: usize, typ: Type, name: Option<&str>) -> Local {
        Local {
            id: LocalId::from(id),
            typ,
            name: name.map(str::to_string),
        }
    }

    #[test]
    fn test_display_module() {
        let mut module = Module::default();

        let mut ext_locals = VecMap::new();
        ext_locals.insert_node(local(0, Type::I64, None));
        module.funcs.push_with(|id| Func {
            id,
            name: "ext".to_string(),
            ret_type: Type::I32,
            params: vec![LocalId::from(0)],
            variadic: true,
            locals: ext_locals,
            bbs: VecMap::new(),
        });

        let k = LocalId::from(0);
        let slot = LocalId::from(1);
        let mut locals = VecMap::new();
        locals.insert_node(local(0, Type::I32, Some("k")));
        locals.insert_node(local(1, Type::Ptr, None));
        let mut bbs = VecMap::new();
        bbs.insert_node(BasicBlock {
            id: BasicBlockId::from(0),
            label: Some("entry".to_string()),
            instrs: vec![Instr {
                local: Some(slot),
                kind: InstrKind::Alloca(Type::I8),
            }],
            next: TerminatorInstr::Switch {
                value: Operand::Local(k),
                default: BasicBlockId::from(1),
                cases: vec![
                    (Constant::int(32, 0), BasicBlockId::from(1)),
                    (Constant::int(32, 1), BasicBlockId::from(2)),
                ],
            },
        });
        bbs.insert_node(BasicBlock {
            id: BasicBlockId::from(1),
            label: None,
            instrs: vec![],
            next: TerminatorInstr::IndirectBr {
                addr: Operand::Local(slot),
                dests: vec![BasicBlockId::from(2)],
            },
        });
        bbs.insert_node(BasicBlock {
            id: BasicBlockId::from(2),
            label: Some("exit".to_string()),
            instrs: vec![],
            next: TerminatorInstr::Ret(None),
        });
        module.funcs.push_with(|id| Func {
            id,
            name: "f".to_string(),
            ret_type: Type::Void,
            params: vec![k],
            variadic: false,
            locals,
            bbs,
        });

        insta::assert_snapshot!(module.display().to_string(), @r"
        declare i32 @ext(i64, ...)

        define void @f(i32 %k) {
        entry:
          %1 = alloca i8
          switch i32 %k, label %bb1 [i32 0, label %bb1 i32 1, label %exit]
        bb1:
          indirectbr ptr %1, [label %exit]
        exit:
          ret void
        }
        ");
    }
}
