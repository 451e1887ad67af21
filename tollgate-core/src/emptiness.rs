use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::sync::Arc;

/// Whether a successful upstream result carries no data.
///
/// Some upstreams answer "nothing" instead of failing. A cache treats such a
/// result as non-authoritative and keeps serving its previous value. Domain types
/// that are never empty can rely on the default method.
pub trait Emptiness {
    /// True if this value should not replace a cached one.
    fn is_empty_result(&self) -> bool {
        false
    }
}

impl<T> Emptiness for Vec<T> {
    fn is_empty_result(&self) -> bool {
        self.is_empty()
    }
}

impl<T> Emptiness for VecDeque<T> {
    fn is_empty_result(&self) -> bool {
        self.is_empty()
    }
}

impl<T> Emptiness for Option<T> {
    fn is_empty_result(&self) -> bool {
        self.is_none()
    }
}

impl Emptiness for String {
    fn is_empty_result(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V, S> Emptiness for HashMap<K, V, S> {
    fn is_empty_result(&self) -> bool {
        self.is_empty()
    }
}

impl<T, S> Emptiness for HashSet<T, S> {
    fn is_empty_result(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V> Emptiness for BTreeMap<K, V> {
    fn is_empty_result(&self) -> bool {
        self.is_empty()
    }
}

impl<T> Emptiness for BTreeSet<T> {
    fn is_empty_result(&self) -> bool {
        self.is_empty()
    }
}

impl Emptiness for serde_json::Value {
    fn is_empty_result(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Array(items) => items.is_empty(),
            Self::Object(map) => map.is_empty(),
            _ => false,
        }
    }
}

impl<T: Emptiness + ?Sized> Emptiness for Arc<T> {
    fn is_empty_result(&self) -> bool {
        (**self).is_empty_result()
    }
}

impl<T: Emptiness + ?Sized> Emptiness for Rc<T> {
    fn is_empty_result(&self) -> bool {
        (**self).is_empty_result()
    }
}

impl<T: Emptiness + ?Sized> Emptiness for Box<T> {
    fn is_empty_result(&self) -> bool {
        (**self).is_empty_result()
    }
}

impl<T> Emptiness for [T] {
    fn is_empty_result(&self) -> bool {
        self.is_empty()
    }
}

impl Emptiness for str {
    fn is_empty_result(&self) -> bool {
        self.is_empty()
    }
}

macro_rules! never_empty {
    ($($t:ty),* $(,)?) => {
        $(impl Emptiness for $t {})*
    };
}

never_empty!(
    bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64,
);

impl<A: Emptiness, B: Emptiness> Emptiness for (A, B) {
    fn is_empty_result(&self) -> bool {
        self.0.is_empty_result() && self.1.is_empty_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn collections_and_json() {
        assert!(Vec::<u8>::new().is_empty_result());
        assert!(!vec![1].is_empty_result());
        assert!(None::<u8>.is_empty_result());
        assert!(json!(null).is_empty_result());
        assert!(json!([]).is_empty_result());
        assert!(json!({}).is_empty_result());
        assert!(!json!({ "BTC": 1 }).is_empty_result());
        assert!(!json!(0).is_empty_result());
        assert!(Arc::new(String::new()).is_empty_result());
        assert!(!1.5_f64.is_empty_result());
    }
}
