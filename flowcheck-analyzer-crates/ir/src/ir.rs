use vec_map::{HasId, VecMap};

use super::id::*;
use super::instr::*;
use super::operand::*;
use super::typ::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    pub id: BasicBlockId,
    pub label: Option<String>,
    pub instrs: Vec<Instr>,
    pub next: TerminatorInstr,
}

impl BasicBlock {
    pub fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        self.instrs
            .iter_mut()
            .flat_map(|instr| instr.kind.operands_mut())
            .chain(self.next.operands_mut())
    }

    pub fn operands(&self) -> impl Iterator<Item = &Operand> {
        self.instrs
            .iter()
            .flat_map(|instr| instr.kind.operands())
            .chain(self.next.operands())
    }

    pub fn bb_ids_mut(&mut self) -> impl Iterator<Item = &mut BasicBlockId> {
        self.instrs
            .iter_mut()
            .flat_map(|instr| instr.kind.bb_ids_mut())
            .chain(self.next.bb_ids_mut())
    }

    pub fn bb_ids(&self) -> impl Iterator<Item = &BasicBlockId> {
        self.instrs
            .iter()
            .flat_map(|instr| instr.kind.bb_ids())
            .chain(self.next.bb_ids())
    }
}

impl HasId for BasicBlock {
    type Id = BasicBlockId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Local {
    pub id: LocalId,
    pub typ: Type,
    // Noneは無名の値 (テキスト上では%0のような番号で表される)
    pub name: Option<String>,
}

impl HasId for Local {
    type Id = LocalId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

#[derive(Debug, Clone)]
pub struct Func {
    pub id: FuncId,
    pub name: String,
    pub ret_type: Type,
    pub params: Vec<LocalId>,
    pub variadic: bool,
    pub locals: VecMap<LocalId, Local>,
    pub bbs: VecMap<BasicBlockId, BasicBlock>,
}

impl HasId for Func {
    type Id = FuncId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

impl Func {
    /// A function without a body (`declare`).
    pub fn is_declaration(&self) -> bool {
        self.bbs.is_empty()
    }

    /// The first block in stored order.
    pub fn entry_bb(&self) -> Option<BasicBlockId> {
        self.bbs.keys().next()
    }

    pub fn is_param(&self, local: LocalId) -> bool {
        self.params.contains(&local)
    }

    pub fn local_name(&self, local: LocalId) -> Option<&str> {
        self.locals.get(local).and_then(|l| l.name.as_deref())
    }

    pub fn has_local_named(&self, name: &str) -> bool {
        self.locals
            .values()
            .any(|local| local.name.as_deref() == Some(name))
    }

    pub fn operand_type(&self, operand: &Operand) -> Type {
        match operand {
            Operand::Local(id) => self
                .locals
                .get(*id)
                .map_or(Type::Void, |local| local.typ.clone()),
            Operand::Global(_) | Operand::Func(_) => Type::Ptr,
            Operand::Const(c) => c.typ(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Global {
    pub id: GlobalId,
    pub name: String,
    pub typ: Type,
    pub init: Option<Operand>,
    pub external: bool,
}

impl HasId for Global {
    type Id = GlobalId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

#[derive(Debug, Clone, Default)]
pub struct Module {
    pub globals: VecMap<GlobalId, Global>,
    pub funcs: VecMap<FuncId, Func>,
}

impl Module {
    pub fn func_by_name(&self, name: &str) -> Option<FuncId> {
        self.funcs
            .iter()
            .find(|(_, func)| func.name == name)
            .map(|(id, _)| id)
    }

    pub fn func_names(&self) -> Vec<String> {
        self.funcs.values().map(|func| func.name.clone()).collect()
    }

    /// Every operand in the module, including global initializers.
    pub fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        self.globals
            .values_mut()
            .filter_map(|global| global.init.as_mut())
            .chain(
                self.funcs
                    .values_mut()
                    .flat_map(|func| func.bbs.values_mut())
                    .flat_map(|bb| bb.operands_mut()),
            )
    }

    pub fn operands(&self) -> impl Iterator<Item = &Operand> {
        self.globals
            .values()
            .filter_map(|global| global.init.as_ref())
            .chain(
                self.funcs
                    .values()
                    .flat_map(|func| func.bbs.values())
                    .flat_map(|bb| bb.operands()),
            )
    }

    /// Rewrites every reference to `func_id` into `replacement` and returns how many were rewritten.
    pub fn replace_all_uses_of_func(&mut self, func_id: FuncId, replacement: &Operand) -> usize {
        let mut count = 0;
        for operand in self.operands_mut() {
            if operand.as_func() == Some(func_id) {
                *operand = replacement.clone();
                count += 1;
            }
        }
        count
    }

    // 参照が残っていると宙に浮くので、先にreplace_all_uses_of_funcを呼ぶこと
    pub fn remove_func(&mut self, func_id: FuncId) -> Option<Func> {
        debug_assert!(
            self.operands().all(|operand| operand.as_func() != Some(func_id)),
            "function {} is still referenced",
            func_id
        );
        self.funcs.remove(func_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn func_with_call(id: usize, name: &str, callee: Option<FuncId>) -> Func {
        let mut bbs = VecMap::new();
        let mut instrs = Vec::new();
        if let Some(callee) = callee {
            instrs.push(Instr {
                local: None,
                kind: InstrKind::Call(InstrCall {
                    ret_type: Type::Void,
                    callee: Operand::Func(callee),
                    args: vec![],
                }),
            });
        }
        bbs.push_with(|id| BasicBlock {
            id,
            label: None,
            instrs,
            next: TerminatorInstr::Ret(None),
        });
        Func {
            id: FuncId::from(id),
            name: name.to_string(),
            ret_type: Type::Void,
            params: vec![],
            variadic: false,
            locals: VecMap::new(),
            bbs,
        }
    }

    #[test]
    fn test_replace_then_remove() {
        let mut module = Module::default();
        let dead = FuncId::from(1);
        module.funcs.insert_node(func_with_call(0, "main", Some(dead)));
        module.funcs.insert_node(func_with_call(1, "dead", None));
        module.globals.push_with(|id| Global {
            id,
            name: "fp".to_string(),
            typ: Type::Ptr,
            init: Some(Operand::Func(dead)),
            external: false,
        });

        let undef = Operand::Const(Constant::Undef(Type::Ptr));
        assert_eq!(module.replace_all_uses_of_func(dead, &undef), 2);
        assert!(module.remove_func(dead).is_some());

        assert_eq!(module.func_names(), vec!["main".to_string()]);
        assert_eq!(module.func_by_name("dead"), None);
        assert!(module.operands().all(|operand| operand.as_func().is_none()));
    }
}
