// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Sub-threads.
//!
//! A running application or service may start extra threads inside its own
//! domain. They are not granted anything individually: they inherit the
//! domain and every permission of their creator. For that to work, the
//! child's control block and stack must already be in the parent's object
//! list, so the main thread was granted them at boot.

use abi::{ObjectRef, Priority};

use crate::descs::{AppDesc, EntryFn};
use crate::err::SpawnError;
use crate::kernel::{Syscalls, ThreadOptions, ThreadSpec};

#[derive(Copy, Clone, Debug)]
pub struct SubThread {
    pub thread: ObjectRef,
    pub stack: ObjectRef,
    pub stack_size: usize,
    pub entry: EntryFn,
    pub priority: Priority,
}

/// Creates, but does not start, a sub-thread of `parent`.
pub fn create_sub_thread<K: Syscalls + ?Sized>(
    kernel: &mut K,
    parent: &AppDesc,
    sub: &SubThread,
) -> Result<ObjectRef, SpawnError> {
    for object in [sub.thread, sub.stack] {
        if !parent.declares(object) {
            return Err(SpawnError::Undeclared(object));
        }
    }

    let mut options = ThreadOptions::INHERIT_PERMS;
    if parent.user_task {
        options |= ThreadOptions::USER;
    }

    Ok(kernel.thread_create(&ThreadSpec {
        thread: sub.thread,
        stack: sub.stack,
        stack_size: sub.stack_size,
        entry: sub.entry,
        priority: sub.priority,
        options,
    }))
}

/// Creates a sub-thread of `parent` and makes it runnable.
pub fn spawn_sub_thread<K: Syscalls + ?Sized>(
    kernel: &mut K,
    parent: &AppDesc,
    sub: &SubThread,
) -> Result<ObjectRef, SpawnError> {
    let thread = create_sub_thread(kernel, parent, sub)?;
    kernel.thread_start(thread);
    Ok(thread)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Call, SimKernel};
    use abi::AppMode;

    fn worker(_: &mut dyn Syscalls) {}

    static PARENT_OBJS: [ObjectRef; 3] = [
        ObjectRef::from_addr(0x500),
        ObjectRef::from_addr(0x600),
        ObjectRef::from_addr(0x700),
    ];

    fn parent() -> AppDesc {
        AppDesc::new(
            AppMode::APP | AppMode::PART_GLOBAL,
            worker,
            ObjectRef::from_addr(0x100),
            ObjectRef::from_addr(0x200),
            0x400,
        )
        .with_objects(&PARENT_OBJS)
    }

    fn sub(thread: usize, stack: usize) -> SubThread {
        SubThread {
            thread: ObjectRef::from_addr(thread),
            stack: ObjectRef::from_addr(stack),
            stack_size: 0x200,
            entry: worker,
            priority: Priority::app(4),
        }
    }

    #[test]
    fn child_inherits_and_runs() {
        let mut kernel = SimKernel::default();
        let t = spawn_sub_thread(&mut kernel, &parent(), &sub(0x600, 0x700))
            .unwrap();

        assert_eq!(t, ObjectRef::from_addr(0x600));
        assert_eq!(
            kernel.creation(t),
            Some((
                Priority::app(4),
                ThreadOptions::USER | ThreadOptions::INHERIT_PERMS
            ))
        );
        assert_eq!(kernel.started(), [t]);
        assert!(kernel.grants_to(t).is_empty());
    }

    #[test]
    fn privileged_parent_has_privileged_children() {
        let mut kernel = SimKernel::default();
        let t = create_sub_thread(
            &mut kernel,
            &parent().privileged(),
            &sub(0x600, 0x700),
        )
        .unwrap();
        assert_eq!(
            kernel.creation(t).map(|(_, o)| o),
            Some(ThreadOptions::INHERIT_PERMS)
        );
        assert!(kernel.started().is_empty());
    }

    #[test]
    fn undeclared_storage_is_refused() {
        let mut kernel = SimKernel::default();
        assert_eq!(
            spawn_sub_thread(&mut kernel, &parent(), &sub(0x600, 0x800)),
            Err(SpawnError::Undeclared(ObjectRef::from_addr(0x800)))
        );
        assert_eq!(
            spawn_sub_thread(&mut kernel, &parent(), &sub(0x900, 0x700)),
            Err(SpawnError::Undeclared(ObjectRef::from_addr(0x900)))
        );
        assert!(!kernel
            .calls
            .iter()
            .any(|c| matches!(c, Call::ThreadCreate { .. })));
    }
}
