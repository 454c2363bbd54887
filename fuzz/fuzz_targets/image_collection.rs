// SPDX-License-Identifier: PMPL-1.0
#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use std::collections::HashSet;

use persona_audit::config::UploadConfig;
use persona_audit::images::{ImageCollection, ImagePayload};

#[derive(Arbitrary, Debug)]
enum Op {
    Add { name: String, png: bool, size: u16 },
    Remove(u8),
    Select(u8),
    Clear,
}

fuzz_target!(|ops: Vec<Op>| {
    let mut images = ImageCollection::new(UploadConfig::default());

    for op in ops {
        match op {
            Op::Add { name, png, size } => {
                let media_type = if png { "image/png" } else { "text/plain" };
                let _ = images.add(ImagePayload::new(name, media_type, vec![0; size as usize]));
            }
            Op::Remove(i) => {
                let id = images.list().get(i as usize).map(|c| c.id.clone());
                if let Some(id) = id {
                    images.remove(&id);
                }
            }
            Op::Select(i) => {
                let id = images.list().get(i as usize).map(|c| c.id.clone());
                images.set_current(id.as_deref());
            }
            Op::Clear => images.clear(),
        }

        let names: HashSet<_> = images.list().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names.len(), images.len());
        assert_eq!(images.live_previews(), images.len());
        if let Some(current) = images.current() {
            assert!(images.get(&current.id).is_some());
        }
    }
});
