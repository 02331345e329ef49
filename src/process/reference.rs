//! Reference cell arena
//!
//! Cells are addressed by [`RefId`]. A process maps each name it mentions to
//! one cell; replicas get fresh cells holding copies, never shared ones.

use crate::core::errors::{PiplError, Result};
use crate::core::value::{RefId, Value};

#[derive(Debug, Default)]
pub struct References {
    cells: Vec<Option<Value>>,
    free: Vec<RefId>,
}

impl References {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a cell, reusing a released slot when one is available
    pub fn alloc(&mut self, value: Value) -> RefId {
        if let Some(id) = self.free.pop() {
            if let Some(cell) = self.cells.get_mut(id.0) {
                *cell = Some(value);
                return id;
            }
        }
        self.cells.push(Some(value));
        RefId(self.cells.len() - 1)
    }

    pub fn get(&self, id: RefId) -> Result<&Value> {
        self.cells
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(PiplError::UnknownReference(id))
    }

    pub fn set(&mut self, id: RefId, value: Value) -> Result<()> {
        match self.cells.get_mut(id.0) {
            Some(cell @ Some(_)) => {
                *cell = Some(value);
                Ok(())
            }
            _ => Err(PiplError::UnknownReference(id)),
        }
    }

    /// Fresh cells holding copies of the given cells' values
    pub fn copy_all(&mut self, ids: &[RefId]) -> Result<Vec<RefId>> {
        let values = ids
            .iter()
            .map(|id| self.get(*id).cloned())
            .collect::<Result<Vec<_>>>()?;
        Ok(values.into_iter().map(|value| self.alloc(value)).collect())
    }

    /// Return a cell to the free list. Releasing twice is ignored.
    pub fn release(&mut self, id: RefId) {
        if let Some(cell) = self.cells.get_mut(id.0) {
            if cell.take().is_some() {
                self.free.push(id);
            }
        }
    }

    /// Number of live cells
    pub fn live(&self) -> usize {
        self.cells.len() - self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_get_set() {
        let mut refs = References::new();
        let a = refs.alloc(Value::Int(1));
        let b = refs.alloc(Value::Unset);

        assert_eq!(refs.get(a).unwrap(), &Value::Int(1));
        assert!(refs.get(b).unwrap().is_unset());

        refs.set(b, Value::from('x')).unwrap();
        assert_eq!(refs.get(b).unwrap(), &Value::Char('x'));
        assert_eq!(refs.live(), 2);
    }

    #[test]
    fn test_copies_are_independent() {
        let mut refs = References::new();
        let original = vec![refs.alloc(Value::Int(1)), refs.alloc(Value::from("a"))];
        let copy = refs.copy_all(&original).unwrap();

        refs.set(copy[0], Value::Int(99)).unwrap();
        assert_eq!(refs.get(original[0]).unwrap(), &Value::Int(1));
        assert_eq!(refs.get(copy[1]).unwrap(), &Value::from("a"));
        assert_ne!(original, copy);
    }

    #[test]
    fn test_release_and_reuse() {
        let mut refs = References::new();
        let a = refs.alloc(Value::Int(1));
        refs.release(a);
        refs.release(a);

        assert!(matches!(refs.get(a), Err(PiplError::UnknownReference(_))));
        assert!(refs.set(a, Value::Int(2)).is_err());
        assert_eq!(refs.live(), 0);

        let b = refs.alloc(Value::Int(3));
        assert_eq!(a, b);
        assert_eq!(refs.get(b).unwrap(), &Value::Int(3));
    }

    #[test]
    fn test_unknown_reference() {
        let refs = References::new();
        assert!(matches!(
            refs.get(RefId(4)),
            Err(PiplError::UnknownReference(RefId(4)))
        ));
    }
}
