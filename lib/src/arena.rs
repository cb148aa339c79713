use std::{
    marker::PhantomData,
    ops::{Index, IndexMut},
};

/// Append-only storage addressed by typed ids. Iteration follows insertion
/// order.
#[derive(Clone, Debug, PartialEq)]
pub struct Arena<Id: IdLike + Copy, T> {
    inner: Vec<T>,
    _phantom: PhantomData<Id>,
}

impl<Id: IdLike + Copy, T> Arena<Id, T> {
    pub fn new() -> Self {
        Self {
            inner: Vec::new(),
            _phantom: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn push(&mut self, x: T) -> Id {
        let id = Id::from_raw(self.inner.len());
        self.inner.push(x);
        id
    }

    pub fn get(&self, id: Id) -> Option<&T> {
        self.inner.get(id.into_raw())
    }

    pub fn get_mut(&mut self, id: Id) -> Option<&mut T> {
        self.inner.get_mut(id.into_raw())
    }

    pub fn ids(&self) -> impl Iterator<Item = Id> {
        (0..self.inner.len()).map(Id::from_raw)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Id, &T)> {
        self.inner
            .iter()
            .enumerate()
            .map(|(i, v)| (Id::from_raw(i), v))
    }
}

impl<Id: IdLike + Copy, T> Default for Arena<Id, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id: IdLike + Copy, T> Index<Id> for Arena<Id, T> {
    type Output = T;

    fn index(&self, index: Id) -> &Self::Output {
        &self.inner[index.into_raw()]
    }
}

impl<Id: IdLike + Copy, T> IndexMut<Id> for Arena<Id, T> {
    fn index_mut(&mut self, index: Id) -> &mut Self::Output {
        &mut self.inner[index.into_raw()]
    }
}

pub trait IdLike {
    fn from_raw(index: usize) -> Self;
    fn into_raw(self) -> usize;
}

#[test]
fn ids_follow_insertion_order() {
    #[derive(Copy, Clone, Debug, PartialEq)]
    struct Id(usize);
    impl IdLike for Id {
        fn from_raw(index: usize) -> Self {
            Id(index)
        }

        fn into_raw(self) -> usize {
            self.0
        }
    }

    let mut arena = Arena::<Id, &str>::new();
    assert!(arena.is_empty());
    let a = arena.push("a");
    let b = arena.push("b");
    arena[a] = "c";
    assert_eq!(arena.len(), 2);
    assert_eq!(arena.iter().collect::<Vec<_>>(), vec![(a, &"c"), (b, &"b")]);
    assert_eq!(arena.ids().collect::<Vec<_>>(), vec![a, b]);
    assert_eq!(arena.get(Id(7)), None);
}
