use std::collections::BTreeMap;

use tracing::warn;

/// RGB-encoded object id rendered into the off-screen picking target.
pub type PickColor = [f32; 3];

/// Color of pixels that belong to no object.
pub const NO_PICK: PickColor = [0.0, 0.0, 0.0];

/// Largest index representable in three 8-bit channels.
const MAX_PICK_INDEX: u32 = 0x00ff_ffff;

/// Identity encoder shared by every building layer.
///
/// Each distinct identifier gets a 1-based slot; the slot is spread over the
/// red (low byte), green and blue (high byte) channels. Slot 0 is reserved
/// for "nothing here", so absent identifiers encode to [`NO_PICK`].
///
/// The mapping is injective over registered identifiers and stable for the
/// registry's lifetime: the same identifier always yields the same color,
/// independently of when or in which batch it was first seen.
#[derive(Debug, Default)]
pub struct PickingRegistry {
    ids: Vec<String>,
    slots: BTreeMap<String, u32>,
}

impl PickingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn id_to_color(&mut self, id: Option<&str>) -> PickColor {
        let Some(id) = id else {
            return NO_PICK;
        };
        match self.slot_for(id) {
            Some(slot) => slot_to_color(slot),
            None => NO_PICK,
        }
    }

    /// Decodes a color read back from the picking target.
    pub fn color_to_id(&self, rgb: [u8; 3]) -> Option<&str> {
        let slot = rgb[0] as u32 | (rgb[1] as u32) << 8 | (rgb[2] as u32) << 16;
        if slot == 0 {
            return None;
        }
        self.ids.get(slot as usize - 1).map(String::as_str)
    }

    /// Same as [`PickingRegistry::color_to_id`] for normalized float channels.
    pub fn pick_color_to_id(&self, color: PickColor) -> Option<&str> {
        self.color_to_id(color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
    }

    fn slot_for(&mut self, id: &str) -> Option<u32> {
        if let Some(slot) = self.slots.get(id) {
            return Some(*slot);
        }
        let slot = self.ids.len() as u32 + 1;
        if slot > MAX_PICK_INDEX {
            warn!(id, "picking id space exhausted; object will not be pickable");
            return None;
        }
        self.ids.push(id.to_string());
        self.slots.insert(id.to_string(), slot);
        Some(slot)
    }
}

fn slot_to_color(slot: u32) -> PickColor {
    [
        (slot & 0xff) as f32 / 255.0,
        ((slot >> 8) & 0xff) as f32 / 255.0,
        ((slot >> 16) & 0xff) as f32 / 255.0,
    ]
}

#[cfg(test)]
mod tests {
    use super::{NO_PICK, PickingRegistry};

    #[test]
    fn absent_id_is_not_pickable() {
        let mut reg = PickingRegistry::new();
        assert_eq!(reg.id_to_color(None), NO_PICK);
        assert!(reg.is_empty());
        assert_eq!(reg.color_to_id([0, 0, 0]), None);
    }

    #[test]
    fn same_id_same_color() {
        let mut reg = PickingRegistry::new();
        let a1 = reg.id_to_color(Some("way/1"));
        let b = reg.id_to_color(Some("way/2"));
        let a2 = reg.id_to_color(Some("way/1"));
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn colors_decode_back_to_ids() {
        let mut reg = PickingRegistry::new();
        let ids: Vec<String> = (0..300).map(|i| format!("b{i}")).collect();
        let colors: Vec<_> = ids.iter().map(|id| reg.id_to_color(Some(id.as_str()))).collect();
        for (id, color) in ids.iter().zip(colors) {
            assert_eq!(reg.pick_color_to_id(color), Some(id.as_str()));
        }
    }

    #[test]
    fn slots_spill_into_green_channel() {
        let mut reg = PickingRegistry::new();
        for i in 0..256 {
            reg.id_to_color(Some(i.to_string().as_str()));
        }
        // slot 256 -> r=0, g=1
        assert_eq!(reg.color_to_id([0, 1, 0]), Some("255"));
        assert_eq!(reg.color_to_id([255, 0, 0]), Some("254"));
    }
}
