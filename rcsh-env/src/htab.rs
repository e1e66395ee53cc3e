// This file is part of rcsh, a Plan 9-style command shell for Unix.
// Copyright (C) 2024 rcsh contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Open-addressed hash table shared by the name resolution tables.
//!
//! The variable, function and command-path tables are all instances of
//! [`Htab`]: linear probing over a power-of-two slot array, doubled once more
//! than half the slots are in use. A deleted slot becomes a tombstone that
//! probes continue past, unless the next slot is empty, in which case the
//! deleted slot collapses back to empty. Tombstones count toward the load
//! factor until a rehash drops them.

/// Initial slot count of every table.
///
/// The table works with as few as 2 slots; 64 is about right for normal use.
const INITIAL_SIZE: usize = 64;

#[derive(Clone, Debug)]
enum Slot<V> {
    Empty,
    /// Tombstone left by a deletion. Lookups probe past it; insertions may
    /// reuse it.
    Dead,
    Full { name: String, value: V },
}

impl<V> Slot<V> {
    fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }
}

/// Open-addressed hash table keyed by name.
#[derive(Clone, Debug)]
pub struct Htab<V> {
    slots: Vec<Slot<V>>,
    /// Count of full and dead slots.
    used: usize,
}

/// Byte-mixing hash, masked with `size - 1`.
fn hash(name: &str, size: usize) -> usize {
    let mut n: i32 = 0;
    let mut bytes = name.bytes();
    'mix: loop {
        let Some(c) = bytes.next() else { break 'mix };
        let c = i32::from(c);
        n = n.wrapping_add((c << 17) ^ (c << 11) ^ (c << 5) ^ (c >> 1));
        let Some(c) = bytes.next() else { break 'mix };
        let c = i32::from(c);
        n ^= (c << 14) + (c << 7) + (c << 4) + c;
        let Some(c) = bytes.next() else { break 'mix };
        let c = i32::from(c);
        n ^= ((!c) << 11) | ((c << 3) ^ (c >> 1));
        let Some(c) = bytes.next() else { break 'mix };
        let c = i32::from(c);
        n = n.wrapping_sub((c << 16) | (c << 9) | (c << 2) | (c & 3));
    }
    if n < 0 {
        n = !n;
    }
    n as usize & (size - 1)
}

/// Result of probing for a name.
struct Probe {
    /// Index of the matching full slot, if the name is present.
    found: Option<usize>,
    /// Index where an insertion would go: the first tombstone passed, or the
    /// empty slot that ended the probe.
    insert_at: usize,
}

impl<V> Default for Htab<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Htab<V> {
    pub fn new() -> Self {
        let mut slots = Vec::new();
        slots.resize_with(INITIAL_SIZE, || Slot::Empty);
        Htab { slots, used: 0 }
    }

    /// Number of slots currently allocated.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn probe(&self, name: &str) -> Probe {
        let mask = self.slots.len() - 1;
        let mut h = hash(name, self.slots.len());
        let mut first_dead = None;
        loop {
            match &self.slots[h] {
                Slot::Empty => {
                    return Probe { found: None, insert_at: first_dead.unwrap_or(h) };
                }
                Slot::Dead => {
                    first_dead.get_or_insert(h);
                }
                Slot::Full { name: n, .. } if n == name => {
                    return Probe { found: Some(h), insert_at: h };
                }
                Slot::Full { .. } => {}
            }
            h = (h + 1) & mask;
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&V> {
        let i = self.probe(name).found?;
        match &self.slots[i] {
            Slot::Full { value, .. } => Some(value),
            _ => unreachable!("probe returned a non-full slot"),
        }
    }

    #[must_use]
    pub fn get_mut(&mut self, name: &str) -> Option<&mut V> {
        let i = self.probe(name).found?;
        match &mut self.slots[i] {
            Slot::Full { value, .. } => Some(value),
            _ => unreachable!("probe returned a non-full slot"),
        }
    }

    /// Finds the entry for `name`, inserting a fresh value if absent.
    pub fn get_or_insert_with<F>(&mut self, name: &str, default: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        let mut probe = self.probe(name);
        if probe.found.is_none() {
            if self.used * 2 >= self.slots.len() {
                self.rehash();
                probe = self.probe(name);
            }
            let i = probe.insert_at;
            if self.slots[i].is_empty() {
                self.used += 1;
            }
            self.slots[i] = Slot::Full { name: name.to_owned(), value: default() };
            probe.found = Some(i);
        }
        match &mut self.slots[probe.found.unwrap()] {
            Slot::Full { value, .. } => value,
            _ => unreachable!("just inserted"),
        }
    }

    /// Removes the entry for `name` and returns its value.
    ///
    /// If the slot following the removed one is empty the removed slot is
    /// collapsed to empty and the used count decremented; otherwise it
    /// becomes a tombstone.
    pub fn remove(&mut self, name: &str) -> Option<V> {
        let i = self.probe(name).found?;
        let next = (i + 1) & (self.slots.len() - 1);
        let replacement = if self.slots[next].is_empty() {
            self.used -= 1;
            Slot::Empty
        } else {
            Slot::Dead
        };
        match std::mem::replace(&mut self.slots[i], replacement) {
            Slot::Full { value, .. } => Some(value),
            _ => unreachable!("probe returned a non-full slot"),
        }
    }

    /// Empties the table, keeping the allocated slots.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = Slot::Empty;
        }
        self.used = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Full { name, value } => Some((name.as_str(), value)),
            _ => None,
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut V)> {
        self.slots.iter_mut().filter_map(|slot| match slot {
            Slot::Full { name, value } => Some((name.as_str(), value)),
            _ => None,
        })
    }

    /// Doubles the slot array and reinserts all live entries, dropping
    /// tombstones.
    fn rehash(&mut self) {
        let new_size = self.slots.len() * 2;
        let mut new_slots = Vec::new();
        new_slots.resize_with(new_size, || Slot::Empty);
        let mut used = 0;
        for slot in self.slots.drain(..) {
            if let Slot::Full { name, value } = slot {
                let mask = new_size - 1;
                let mut h = hash(&name, new_size);
                while !new_slots[h].is_empty() {
                    h = (h + 1) & mask;
                }
                new_slots[h] = Slot::Full { name, value };
                used += 1;
            }
        }
        self.slots = new_slots;
        self.used = used;
    }
}
