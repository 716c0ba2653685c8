use super::{Gate, Sig};
use std::ops::{Index, IndexMut};

/// Dense map from the gates of one arena to `T`, grown on demand with the
/// type's default value.
#[derive(Clone, Debug, Default)]
pub struct GMap<T> {
    v: Vec<T>,
}

impl<T: Clone + Default> GMap<T> {
    pub fn new() -> Self {
        Self { v: Vec::new() }
    }

    pub fn with_last(last: Gate) -> Self {
        let mut m = Self::new();
        m.grow_to(last);
        m
    }

    pub fn grow_to(&mut self, last: Gate) {
        if self.v.len() <= last.index() {
            self.v.resize(last.index() + 1, T::default());
        }
    }

    pub fn clear(&mut self) {
        self.v.clear();
    }

    #[inline]
    pub fn has(&self, g: Gate) -> bool {
        g.index() < self.v.len()
    }

    #[inline]
    pub fn get(&self, g: Gate) -> Option<&T> {
        self.v.get(g.index())
    }
}

impl<T> Index<Gate> for GMap<T> {
    type Output = T;

    #[inline]
    fn index(&self, g: Gate) -> &T {
        &self.v[g.index()]
    }
}

impl<T> IndexMut<Gate> for GMap<T> {
    #[inline]
    fn index_mut(&mut self, g: Gate) -> &mut T {
        &mut self.v[g.index()]
    }
}

impl GMap<Sig> {
    /// Translate a signal through the map, carrying the inversion over.
    #[inline]
    pub fn sig(&self, s: Sig) -> Sig {
        debug_assert!(self[s.gate()] != Sig::UNDEF);
        self[s.gate()].not_if(s.sign())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cir::Cir;

    #[test]
    fn grows_with_default() {
        let mut c = Cir::new();
        let a = c.input();
        let b = c.input();
        let mut m: GMap<Sig> = GMap::with_last(c.last_gate());
        assert_eq!(m[a.gate()], Sig::UNDEF);
        m[a.gate()] = Sig::TRUE;
        assert_eq!(m.sig(!a), Sig::FALSE);
        assert_eq!(m[b.gate()], Sig::UNDEF);
    }
}
