use flowcheck_analyzer_error::{Result, compiler_error};
use rustc_hash::FxHashMap;

use crate::span::Pos;

// 前方参照を許すための名前表
// 参照された順に仮のidを振り、定義順はorderに記録する
#[derive(Debug, Default)]
pub struct NameTable {
    ids: FxHashMap<String, usize>,
    names: Vec<String>,
    first_use: Vec<Pos>,
    defined: Vec<bool>,
    order: Vec<usize>,
}

impl NameTable {
    pub fn reference(&mut self, name: &str, pos: Pos) -> usize {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.names.len();
        self.ids.insert(name.to_string(), id);
        self.names.push(name.to_string());
        self.first_use.push(pos);
        self.defined.push(false);
        id
    }

    pub fn define(&mut self, name: &str, pos: Pos, sigil: &str) -> Result<usize> {
        let id = self.reference(name, pos);
        if self.defined[id] {
            return Err(compiler_error!(
                Parse,
                "{}: redefinition of {}{}",
                pos,
                sigil,
                name
            ));
        }
        self.defined[id] = true;
        self.order.push(id);
        Ok(id)
    }

    pub fn name(&self, id: usize) -> &str {
        &self.names[id]
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Provisional ids in definition order, or an error for the first name that was never defined.
    pub fn finish(&self, what: &str, sigil: &str) -> Result<Vec<usize>> {
        if let Some(id) = (0..self.names.len()).find(|&id| !self.defined[id]) {
            return Err(compiler_error!(
                Parse,
                "{}: use of undefined {} {}{}",
                self.first_use[id],
                what,
                sigil,
                self.names[id]
            ));
        }
        Ok(self.order.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_reference_order() {
        let mut table = NameTable::default();
        let later = table.reference("later", Pos::new(1, 1));
        let first = table.define("first", Pos::new(2, 1), "%").unwrap();
        assert_eq!(table.define("later", Pos::new(3, 1), "%").unwrap(), later);
        assert_eq!(table.finish("label", "%").unwrap(), vec![first, later]);
    }

    #[test]
    fn test_errors() {
        let mut table = NameTable::default();
        table.define("x", Pos::new(1, 1), "%").unwrap();
        let e = table.define("x", Pos::new(2, 3), "%").unwrap_err();
        assert_eq!(e.message, "2:3: redefinition of %x");

        table.reference("y", Pos::new(4, 5));
        let e = table.finish("value", "%").unwrap_err();
        assert_eq!(e.message, "4:5: use of undefined value %y");
    }
}
