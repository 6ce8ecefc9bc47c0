use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::{Hash, Hasher};

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use sar_proto::{AgentState, CellPos, GridSnapshot};

/// Most-recent distinct cells kept per drone trail.
pub const TRAIL_CAP: usize = 20;

/// Marker/trail color rotation, one slot per drone in first-seen order.
pub const DRONE_COLORS: [(u8, u8, u8); 8] = [
    (0x3b, 0x82, 0xf6),
    (0x10, 0xb9, 0x81),
    (0xf5, 0x9e, 0x0b),
    (0xa8, 0x55, 0xf7),
    (0xec, 0x48, 0x99),
    (0x06, 0xb6, 0xd4),
    (0xef, 0x44, 0x44),
    (0x84, 0xcc, 0x16),
];

#[derive(Debug)]
pub struct DroneTrail {
    pub cells: VecDeque<CellPos>,
    pub color_slot: usize,
}

/// Fading per-cell trail tint: a drone color scaled by recency.
#[derive(Debug, Clone, Copy)]
pub struct TrailTint {
    pub color_slot: usize,
    pub intensity: f64,
}

/// Per-agent motion history for the fading trails. View-local and safe to
/// lose; the cap and consecutive-duplicate dedup keep it bounded no matter
/// how long the stream runs.
#[derive(Debug, Default)]
pub struct TrailSet {
    trails: HashMap<String, DroneTrail>,
}

impl TrailSet {
    /// Record the roster's current positions. A position equal to the last
    /// recorded one for that agent is dropped; older entries fall off the
    /// front past the cap.
    pub fn observe(&mut self, agents: &[AgentState]) {
        for agent in agents {
            let next_slot = self.trails.len() % DRONE_COLORS.len();
            let trail = self
                .trails
                .entry(agent.agent_id.clone())
                .or_insert_with(|| DroneTrail {
                    cells: VecDeque::new(),
                    color_slot: next_slot,
                });
            if trail.cells.back() != Some(&agent.position) {
                trail.cells.push_back(agent.position);
                while trail.cells.len() > TRAIL_CAP {
                    trail.cells.pop_front();
                }
            }
        }
    }

    pub fn get(&self, agent_id: &str) -> Option<&DroneTrail> {
        self.trails.get(agent_id)
    }

    /// Cell → tint for rendering. The current position is excluded (the
    /// marker covers it); intensity ramps 0.1 → 0.4 with recency, and the
    /// first trail to claim a cell keeps it.
    pub fn tint_map(&self) -> HashMap<CellPos, TrailTint> {
        let mut tints = HashMap::new();
        for trail in self.trails.values() {
            let len = trail.cells.len();
            for (idx, cell) in trail.cells.iter().enumerate() {
                if idx + 1 == len {
                    continue;
                }
                let intensity = 0.1 + (idx as f64 / len as f64) * 0.3;
                tints.entry(*cell).or_insert(TrailTint {
                    color_slot: trail.color_slot,
                    intensity,
                });
            }
        }
        tints
    }

    pub fn clear(&mut self) {
        self.trails.clear();
    }
}

/// Tiles the operator has flipped to reveal imagery. Purely local, toggled
/// by interaction only, cleared whenever the imagery is reassigned.
#[derive(Debug, Default)]
pub struct FlippedTiles {
    cells: HashSet<CellPos>,
}

impl FlippedTiles {
    pub fn toggle(&mut self, cell: CellPos) {
        if !self.cells.remove(&cell) {
            self.cells.insert(cell);
        }
    }

    pub fn contains(&self, cell: CellPos) -> bool {
        self.cells.contains(&cell)
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }
}

pub const PERSON_IMAGES: [&str; 5] = [
    "hiker-red-jacket",
    "stretcher-team",
    "climber-signaling",
    "survivor-clearing",
    "kayaker-shore",
];

pub const SCENERY_IMAGES: [&str; 25] = [
    "river-bend",
    "alpine-meadow",
    "birch-stand",
    "scree-field",
    "summit-ridge",
    "glacier-tongue",
    "granite-face",
    "foothill-track",
    "cloud-valley",
    "dune-crest",
    "salt-flat",
    "red-canyon",
    "dry-wash",
    "mesa-edge",
    "pine-canopy",
    "old-growth",
    "fern-gully",
    "logging-road",
    "warehouse-row",
    "rail-yard",
    "rooftop-grid",
    "parking-structure",
    "breakwater",
    "kelp-shallows",
    "tide-pools",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileImage {
    pub name: &'static str,
    pub is_person: bool,
}

/// Per-cell imagery revealed by flipping. Person imagery lands on true
/// target cells (one per target, bounded by the pool); scenery cycles over
/// everything else. The assignment is a pure function of grid size and the
/// target set, so it stays put between snapshots and never flickers.
#[derive(Debug, Default)]
pub struct TileImagery {
    cells: HashMap<CellPos, TileImage>,
    key: Option<u64>,
}

impl TileImagery {
    /// Rebuild if the grid size or target set changed. Returns true when a
    /// reassignment happened (the caller resets flip state on that edge).
    pub fn refresh(&mut self, grid: &GridSnapshot) -> bool {
        let targets = assignment_targets(grid);
        let key = assignment_key(grid, &targets);
        if self.key == Some(key) {
            return false;
        }

        let mut rng = SmallRng::seed_from_u64(key);
        let mut people: Vec<&'static str> = PERSON_IMAGES.to_vec();
        people.shuffle(&mut rng);
        let mut scenery: Vec<&'static str> = SCENERY_IMAGES.to_vec();
        scenery.shuffle(&mut rng);

        self.cells.clear();
        let person_cells: HashSet<CellPos> = targets
            .iter()
            .take(people.len())
            .copied()
            .collect();
        for (slot, cell) in targets.iter().take(people.len()).enumerate() {
            self.cells.insert(
                *cell,
                TileImage {
                    name: people[slot],
                    is_person: true,
                },
            );
        }

        let mut scenery_cursor = 0usize;
        for y in 0..grid.height {
            for x in 0..grid.width {
                let cell = CellPos::new(x, y);
                if person_cells.contains(&cell) {
                    continue;
                }
                self.cells.insert(
                    cell,
                    TileImage {
                        name: scenery[scenery_cursor % scenery.len()],
                        is_person: false,
                    },
                );
                scenery_cursor += 1;
            }
        }

        self.key = Some(key);
        true
    }

    pub fn get(&self, cell: CellPos) -> Option<TileImage> {
        self.cells.get(&cell).copied()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Ground truth wins for imagery when the engine exposes it; otherwise the
/// discovered set is the best available stand-in.
fn assignment_targets(grid: &GridSnapshot) -> Vec<CellPos> {
    let mut targets = match &grid.all_targets {
        Some(all) if !all.is_empty() => all.clone(),
        _ => grid.target_positions.clone(),
    };
    targets.sort_by_key(|cell| (cell.y, cell.x));
    targets.dedup();
    targets
}

fn assignment_key(grid: &GridSnapshot, targets: &[CellPos]) -> u64 {
    let mut hasher = DefaultHasher::new();
    grid.width.hash(&mut hasher);
    grid.height.hash(&mut hasher);
    targets.hash(&mut hasher);
    hasher.finish()
}
