use flowcheck_analyzer_error::{Result, compiler_error};
use flowcheck_analyzer_ir::*;
use vec_map::VecMap;

fn verify_operand(module: &Module, func: Option<&Func>, operand: &Operand) -> Result<()> {
    let owner = func.map_or("<global>", |func| func.name.as_str());
    match operand {
        Operand::Func(func_id) if !module.funcs.contains_key(*func_id) => Err(compiler_error!(
            Verify,
            "{}: reference to removed function {}",
            owner,
            func_id
        )),
        Operand::Global(global_id) if !module.globals.contains_key(*global_id) => {
            Err(compiler_error!(
                Verify,
                "{}: reference to unknown global g{}",
                owner,
                usize::from(*global_id)
            ))
        }
        Operand::Local(local_id) => match func {
            Some(func) if func.locals.contains_key(*local_id) => Ok(()),
            _ => Err(compiler_error!(
                Verify,
                "{}: reference to unknown local %{}",
                owner,
                usize::from(*local_id)
            )),
        },
        _ => Ok(()),
    }
}

fn verify_func(module: &Module, func: &Func) -> Result<()> {
    let mut assigned = VecMap::new();
    for local_id in func.locals.keys() {
        assigned.insert(local_id, false);
    }
    for &param in &func.params {
        if !func.locals.contains_key(param) {
            return Err(compiler_error!(
                Verify,
                "{}: parameter %{} has no local",
                func.name,
                usize::from(param)
            ));
        }
        assigned[param] = true;
    }

    for bb in func.bbs.values() {
        for instr in &bb.instrs {
            if let Some(local_id) = instr.local {
                match assigned.get_mut(local_id) {
                    Some(flag) if !*flag => *flag = true,
                    Some(_) => {
                        return Err(compiler_error!(
                            Verify,
                            "{}: local %{} is assigned more than once",
                            func.name,
                            usize::from(local_id)
                        ));
                    }
                    None => {
                        return Err(compiler_error!(
                            Verify,
                            "{}: result %{} has no local",
                            func.name,
                            usize::from(local_id)
                        ));
                    }
                }
            }
        }
        for operand in bb.operands() {
            verify_operand(module, Some(func), operand)?;
        }
        for &target in bb.bb_ids() {
            if !func.bbs.contains_key(target) {
                return Err(compiler_error!(
                    Verify,
                    "{}: {} jumps to unknown block {}",
                    func.name,
                    bb.id,
                    target
                ));
            }
        }
    }
    Ok(())
}

/// Checks that every reference in the module resolves.
pub fn verify_module(module: &Module) -> Result<()> {
    for global in module.globals.values() {
        if let Some(init) = &global.init {
            verify_operand(module, None, init)?;
        }
    }
    for func in module.funcs.values() {
        verify_func(module, func)?;
    }
    Ok(())
}
