//! Active-marker lifecycle.
//!
//! Per asset id the lifecycle is `Inactive → Unexpanded ⇄ Expanded`, with
//! `Unexpanded → Inactive` driven by an eviction timer or by the capacity cap.
//!
//! Ordering contract:
//! - Every user-driven transition cancels or re-arms the marker's timer
//!   synchronously, so an earlier-armed timer can never evict after a later
//!   hover or expand.
//! - A timer that does fire re-checks the marker at fire time and aborts if
//!   it has been expanded or is hovered.
//! - All teardown goes through [`MarkerLifecycle::deactivate`].

use std::collections::BTreeMap;

use foundation::time::Time;
use runtime::timers::{TimerId, TimerQueue};
use tracing::debug;

use crate::asset::{Asset, AssetId};
use crate::surface::{ElementId, MapSurface};

pub const DEFAULT_EVICTION_DELAY_S: f64 = 3.0;
pub const DEFAULT_MAX_UNEXPANDED: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerConfig {
    pub eviction_delay_s: f64,
    /// Cap on simultaneously active, unexpanded markers.
    pub max_unexpanded: usize,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            eviction_delay_s: DEFAULT_EVICTION_DELAY_S,
            max_unexpanded: DEFAULT_MAX_UNEXPANDED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerState {
    Inactive,
    Unexpanded,
    Expanded,
}

/// What brought an asset into the active set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Hover,
    Scan,
    Expand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    Timer,
    Capacity,
    Cleared,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerChange {
    Activated { id: AssetId, via: Activation },
    Expanded(AssetId),
    Collapsed(AssetId),
    Evicted { id: AssetId, reason: EvictionReason },
}

#[derive(Debug)]
struct ActiveMarker {
    asset: Asset,
    element: ElementId,
    timer: Option<TimerId>,
    expanded: bool,
    hovered: bool,
    /// Activation order; lower is older.
    seq: u64,
}

/// Owns the active markers, their surface elements and their eviction timers.
#[derive(Debug)]
pub struct MarkerLifecycle {
    config: MarkerConfig,
    markers: BTreeMap<AssetId, ActiveMarker>,
    timers: TimerQueue<AssetId>,
    next_seq: u64,
    changes: Vec<MarkerChange>,
}

impl MarkerLifecycle {
    pub fn new(config: MarkerConfig) -> Self {
        Self {
            config,
            markers: BTreeMap::new(),
            timers: TimerQueue::new(),
            next_seq: 0,
            changes: Vec::new(),
        }
    }

    pub fn config(&self) -> MarkerConfig {
        self.config
    }

    pub fn state(&self, id: &AssetId) -> MarkerState {
        match self.markers.get(id) {
            None => MarkerState::Inactive,
            Some(m) if m.expanded => MarkerState::Expanded,
            Some(_) => MarkerState::Unexpanded,
        }
    }

    pub fn is_active(&self, id: &AssetId) -> bool {
        self.markers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn unexpanded_len(&self) -> usize {
        self.markers.values().filter(|m| !m.expanded).count()
    }

    pub fn expanded(&self) -> Option<&Asset> {
        self.markers.values().find(|m| m.expanded).map(|m| &m.asset)
    }

    pub fn has_expanded(&self) -> bool {
        self.markers.values().any(|m| m.expanded)
    }

    /// Active ids, oldest activation first.
    pub fn active_ids(&self) -> Vec<AssetId> {
        let mut v: Vec<(&AssetId, u64)> = self.markers.iter().map(|(id, m)| (id, m.seq)).collect();
        v.sort_by_key(|(_, seq)| *seq);
        v.into_iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn asset(&self, id: &AssetId) -> Option<&Asset> {
        self.markers.get(id).map(|m| &m.asset)
    }

    pub fn element(&self, id: &AssetId) -> Option<ElementId> {
        self.markers.get(id).map(|m| m.element)
    }

    pub fn is_hovered(&self, id: &AssetId) -> bool {
        self.markers.get(id).is_some_and(|m| m.hovered)
    }

    pub fn has_pending_eviction(&self, id: &AssetId) -> bool {
        self.markers
            .get(id)
            .and_then(|m| m.timer)
            .is_some_and(|t| self.timers.is_armed(t))
    }

    pub fn eviction_deadline(&self, id: &AssetId) -> Option<Time> {
        let timer = self.markers.get(id)?.timer?;
        self.timers.deadline(timer)
    }

    pub fn next_deadline(&self) -> Option<Time> {
        self.timers.next_deadline()
    }

    pub fn drain_changes(&mut self) -> Vec<MarkerChange> {
        std::mem::take(&mut self.changes)
    }

    /// Pointer entered the asset's glyph or card.
    pub fn hover_enter(&mut self, asset: &Asset, surface: &mut impl MapSurface) {
        if !self.is_active(&asset.id) {
            self.activate(asset, Activation::Hover, surface);
        }
        if let Some(m) = self.markers.get_mut(&asset.id) {
            m.hovered = true;
            if let Some(t) = m.timer.take() {
                self.timers.cancel(t);
            }
        }
        self.enforce_capacity(Some(&asset.id), surface);
    }

    /// Pointer left the glyph or card: arm a full-length eviction timer.
    pub fn hover_leave(&mut self, id: &AssetId, now: Time) {
        let Some(m) = self.markers.get_mut(id) else {
            return;
        };
        m.hovered = false;
        if !m.expanded {
            self.rearm(id, now);
        }
    }

    /// Clears hover on every marker, e.g. after a click on empty map.
    pub fn pointer_left_all(&mut self, now: Time) {
        let hovered: Vec<AssetId> = self
            .markers
            .iter()
            .filter(|(_, m)| m.hovered)
            .map(|(id, _)| id.clone())
            .collect();
        for id in hovered {
            self.hover_leave(&id, now);
        }
    }

    /// Scan-cycle promotion. Returns `false` if the asset was already active.
    pub fn promote(&mut self, asset: &Asset, now: Time, surface: &mut impl MapSurface) -> bool {
        if self.is_active(&asset.id) {
            return false;
        }
        self.activate(asset, Activation::Scan, surface);
        self.rearm(&asset.id, now);
        self.enforce_capacity(Some(&asset.id), surface);
        true
    }

    /// Expands `asset`, activating it first if needed. Any other expanded
    /// marker is collapsed.
    pub fn expand(&mut self, asset: &Asset, now: Time, surface: &mut impl MapSurface) {
        if !self.is_active(&asset.id) {
            self.activate(asset, Activation::Expand, surface);
        }

        let Some(m) = self.markers.get_mut(&asset.id) else {
            return;
        };
        if !m.expanded {
            m.expanded = true;
            surface.set_marker_expanded(m.element, true);
            self.changes.push(MarkerChange::Expanded(asset.id.clone()));
        }
        if let Some(t) = m.timer.take() {
            self.timers.cancel(t);
        }

        let others: Vec<AssetId> = self
            .markers
            .iter()
            .filter(|(id, m)| m.expanded && **id != asset.id)
            .map(|(id, _)| id.clone())
            .collect();
        for id in others {
            self.collapse(&id, now, surface);
        }
        self.enforce_capacity(None, surface);
    }

    /// Collapses an expanded marker back into the unexpanded set as its
    /// newest member, with a fresh eviction timer.
    pub fn collapse(&mut self, id: &AssetId, now: Time, surface: &mut impl MapSurface) -> bool {
        let seq = self.next_seq;
        let Some(m) = self.markers.get_mut(id) else {
            return false;
        };
        if !m.expanded {
            return false;
        }
        m.expanded = false;
        m.seq = seq;
        self.next_seq += 1;
        surface.set_marker_expanded(m.element, false);
        self.changes.push(MarkerChange::Collapsed(id.clone()));
        self.rearm(id, now);
        self.enforce_capacity(Some(id), surface);
        true
    }

    /// Fires due eviction timers.
    pub fn fire_due(&mut self, now: Time, surface: &mut impl MapSurface) {
        while let Some((timer, id)) = self.timers.pop_due(now) {
            let Some(m) = self.markers.get_mut(&id) else {
                continue;
            };
            if m.timer != Some(timer) {
                continue;
            }
            m.timer = None;
            if m.expanded || m.hovered {
                debug!(asset = %id, "eviction aborted; marker expanded or hovered");
                continue;
            }
            self.deactivate(&id, EvictionReason::Timer, surface);
        }
    }

    /// Tears down every marker (region switch).
    pub fn clear(&mut self, surface: &mut impl MapSurface) {
        let ids: Vec<AssetId> = self.markers.keys().cloned().collect();
        for id in ids {
            self.deactivate(&id, EvictionReason::Cleared, surface);
        }
    }

    /// Every removal goes through here; cancels the eviction timer and
    /// unmounts the card.
    pub fn deactivate(&mut self, id: &AssetId, reason: EvictionReason, surface: &mut impl MapSurface) -> bool {
        let Some(m) = self.markers.remove(id) else {
            return false;
        };
        if let Some(t) = m.timer {
            self.timers.cancel(t);
        }
        surface.unmount_marker(m.element);
        self.changes.push(MarkerChange::Evicted {
            id: id.clone(),
            reason,
        });
        true
    }

    fn activate(&mut self, asset: &Asset, via: Activation, surface: &mut impl MapSurface) {
        let element = surface.mount_marker(asset);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.markers.insert(
            asset.id.clone(),
            ActiveMarker {
                asset: asset.clone(),
                element,
                timer: None,
                expanded: false,
                hovered: false,
                seq,
            },
        );
        self.changes.push(MarkerChange::Activated {
            id: asset.id.clone(),
            via,
        });
    }

    fn rearm(&mut self, id: &AssetId, now: Time) {
        let delay = self.config.eviction_delay_s;
        let Some(m) = self.markers.get_mut(id) else {
            return;
        };
        if let Some(t) = m.timer.take() {
            self.timers.cancel(t);
        }
        m.timer = Some(self.timers.arm(now, delay, id.clone()));
    }

    /// Evicts oldest unexpanded markers until the cap holds. Hovered markers
    /// go only after every unhovered one; `protect` is only sacrificed if
    /// nothing else is evictable.
    fn enforce_capacity(&mut self, protect: Option<&AssetId>, surface: &mut impl MapSurface) {
        while self.unexpanded_len() > self.config.max_unexpanded {
            let pick = |exclude: Option<&AssetId>| {
                self.markers
                    .iter()
                    .filter(|(id, m)| !m.expanded && exclude.is_none_or(|p| p != *id))
                    .min_by_key(|(_, m)| (m.hovered, m.seq))
                    .map(|(id, _)| id.clone())
            };
            let Some(victim) = pick(protect).or_else(|| pick(None)) else {
                return;
            };
            self.deactivate(&victim, EvictionReason::Capacity, surface);
        }
    }
}
