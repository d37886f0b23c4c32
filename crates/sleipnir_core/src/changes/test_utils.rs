//! Small integer-valued object model for ledger tests.

use std::collections::HashMap;
use std::sync::Arc;

use crate::memory::{SlotAllocator, SlotHandle};

use super::{Changes, Collection, Combinable, Memento};

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct TestMemento {
    pub(crate) position: Option<[i64; 3]>,
    pub(crate) mass: Option<i64>,
}

impl Memento for TestMemento {
    type Handle = SlotHandle;
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct TestObject {
    pub(crate) position: [i64; 3],
    pub(crate) mass: i64,
}

impl Combinable<TestMemento> for TestObject {
    fn add_memento(&mut self, memento: &TestMemento) {
        if let Some(position) = memento.position {
            for (axis, delta) in self.position.iter_mut().zip(position) {
                *axis += delta;
            }
        }
        if let Some(mass) = memento.mass {
            self.mass += mass;
        }
    }

    fn multiply_memento(&mut self, memento: &TestMemento) {
        if let Some(position) = memento.position {
            for (axis, factor) in self.position.iter_mut().zip(position) {
                *axis *= factor;
            }
        }
        if let Some(mass) = memento.mass {
            self.mass *= mass;
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct TestCollection {
    pub(crate) objects: HashMap<SlotHandle, TestObject>,
}

impl Collection<TestMemento> for TestCollection {
    type Object = TestObject;
    type Error = String;

    fn spawn(&mut self, handle: SlotHandle, memento: TestMemento) -> Result<(), String> {
        if self.objects.contains_key(&handle) {
            return Err(format!("duplicate handle {handle}"));
        }
        self.objects.insert(
            handle,
            TestObject {
                position: memento.position.unwrap_or_default(),
                mass: memento.mass.unwrap_or_default(),
            },
        );
        Ok(())
    }

    fn get_mut(&mut self, handle: SlotHandle) -> Option<&mut TestObject> {
        self.objects.get_mut(&handle)
    }

    fn delete(&mut self, handle: SlotHandle) -> bool {
        self.objects.remove(&handle).is_some()
    }
}

pub(crate) fn ledger() -> Arc<Changes<TestMemento>> {
    Changes::new(Arc::new(SlotAllocator::new()))
}
