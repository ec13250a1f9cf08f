//! The composite object: a set of parts plus the anchor-pair pose logic.
//!
//! Per frame, every part runs its color/shape pipeline, then each pairing of
//! one anchor-a detection with one anchor-b detection spans an invariant
//! frame. A pending teach click records the invariant pose of whichever
//! detections contain the click, under every pairing; the match pass then
//! flags detections whose invariant pose lands within tolerance of a taught
//! pose. Teaching applies before matching, so a pose taught on a frame is
//! recognized on that same frame.

use std::collections::{BTreeMap, BTreeSet};

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::color::ColorModelError;
use crate::colorspace;
use crate::invariant::{poses_match, AnchorFrame, InvariantPose};
use crate::model_io::ModelData;
use crate::overlay;
use crate::part::PartModel;

// ── Configuration ──────────────────────────────────────────────────────────

pub const DEFAULT_MATCH_TOLERANCE: f64 = 0.15;

fn default_match_tolerance() -> f64 {
    DEFAULT_MATCH_TOLERANCE
}

/// Which two parts anchor the invariant frame, and how close a pose must be
/// to a taught one to count as a match (max-norm over the three components).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeConfig {
    pub anchor_a: String,
    pub anchor_b: String,
    #[serde(default = "default_match_tolerance")]
    pub match_tolerance: f64,
}

impl CompositeConfig {
    pub fn new(anchor_a: impl Into<String>, anchor_b: impl Into<String>) -> Self {
        Self {
            anchor_a: anchor_a.into(),
            anchor_b: anchor_b.into(),
            match_tolerance: DEFAULT_MATCH_TOLERANCE,
        }
    }
}

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors from composite construction and part access.
#[derive(Debug)]
pub enum CompositeError {
    /// A configured anchor names no known part.
    UnknownAnchor(String),
    /// Both anchors name the same part.
    IdenticalAnchors(String),
    /// A part name is not in the composite.
    UnknownPart(String),
    /// Stored data for a part could not be restored.
    PartLoad {
        name: String,
        source: ColorModelError,
    },
}

impl std::fmt::Display for CompositeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownAnchor(name) => write!(f, "anchor is not a known part: {}", name),
            Self::IdenticalAnchors(name) => {
                write!(f, "anchors must be two distinct parts, both are: {}", name)
            }
            Self::UnknownPart(name) => write!(f, "unknown part: {}", name),
            Self::PartLoad { name, source } => {
                write!(f, "stored data for part {} is invalid: {}", name, source)
            }
        }
    }
}

impl std::error::Error for CompositeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::PartLoad { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ── Frame results ──────────────────────────────────────────────────────────

/// One detection that matched a taught pose.
#[derive(Debug, Clone, Serialize)]
pub struct PartMatch {
    pub part: String,
    pub centroid: [f64; 2],
    pub size: f64,
    pub pose: InvariantPose,
}

/// Outcome of processing one frame.
#[derive(Debug, Clone, Serialize)]
pub struct FrameResult {
    /// Detection count per part.
    pub detections: BTreeMap<String, usize>,
    pub matches: Vec<PartMatch>,
    /// Whether a pending teach click recorded at least one pose.
    pub pose_taught: bool,
}

// ── Composite object ───────────────────────────────────────────────────────

struct AnchorPairing {
    frame: AnchorFrame,
    a_index: usize,
    b_index: usize,
}

/// A recognizable compound object: named parts plus anchor configuration.
#[derive(Debug)]
pub struct CompositeObject {
    parts: BTreeMap<String, PartModel>,
    config: CompositeConfig,
    pending_teach: Option<(i32, i32)>,
}

impl CompositeObject {
    /// Build a composite from part names. Fails when an anchor is unknown or
    /// the two anchors coincide.
    pub fn new<I, S>(part_names: I, config: CompositeConfig) -> Result<Self, CompositeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let parts: BTreeMap<String, PartModel> = part_names
            .into_iter()
            .map(|name| {
                let name = name.into();
                let part = PartModel::new(name.clone());
                (name, part)
            })
            .collect();
        Self::validate_anchors(&parts, &config)?;
        Ok(Self {
            parts,
            config,
            pending_teach: None,
        })
    }

    fn validate_anchors(
        parts: &BTreeMap<String, PartModel>,
        config: &CompositeConfig,
    ) -> Result<(), CompositeError> {
        for anchor in [&config.anchor_a, &config.anchor_b] {
            if !parts.contains_key(anchor) {
                return Err(CompositeError::UnknownAnchor(anchor.clone()));
            }
        }
        if config.anchor_a == config.anchor_b {
            return Err(CompositeError::IdenticalAnchors(config.anchor_a.clone()));
        }
        Ok(())
    }

    pub fn config(&self) -> &CompositeConfig {
        &self.config
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    pub fn part(&self, name: &str) -> Result<&PartModel, CompositeError> {
        self.parts
            .get(name)
            .ok_or_else(|| CompositeError::UnknownPart(name.to_string()))
    }

    pub fn part_mut(&mut self, name: &str) -> Result<&mut PartModel, CompositeError> {
        self.parts
            .get_mut(name)
            .ok_or_else(|| CompositeError::UnknownPart(name.to_string()))
    }

    /// Forget a part's color samples. Its taught shape and poses survive.
    pub fn reset_part(&mut self, name: &str) -> Result<(), CompositeError> {
        self.part_mut(name)?.reset_color();
        Ok(())
    }

    /// Arm a one-shot pose teach at screen point `(x, y)`; it is consumed by
    /// the next [`process`](Self::process) call.
    pub fn teach_pose(&mut self, x: i32, y: i32) {
        self.pending_teach = Some((x, y));
    }

    pub fn pending_teach(&self) -> Option<(i32, i32)> {
        self.pending_teach
    }

    // ── Frame processing ───────────────────────────────────────────────────

    /// Process one RGB frame: detect all parts, consume any pending teach
    /// click, then match detections against taught poses. Returns the
    /// annotated overlay and the frame result.
    pub fn process(&mut self, frame: &RgbImage) -> (RgbImage, FrameResult) {
        let hsv = colorspace::rgb_to_hsv(frame);
        let mut canvas = frame.clone();

        let mut counts = BTreeMap::new();
        for (name, part) in self.parts.iter_mut() {
            part.detect(&hsv);
            for pose in part.detections() {
                overlay::draw_pose(&mut canvas, pose);
            }
            counts.insert(name.clone(), part.detections().len());
        }

        let pairings = self.anchor_pairings();

        let pose_taught = match self.pending_teach.take() {
            Some((x, y)) => self.teach_at(&pairings, x, y),
            None => false,
        };

        let matches = self.match_taught(&pairings, &mut canvas);
        tracing::info!(
            pairings = pairings.len(),
            matches = matches.len(),
            pose_taught,
            "frame processed"
        );

        (
            canvas,
            FrameResult {
                detections: counts,
                matches,
                pose_taught,
            },
        )
    }

    /// Every anchor-a/anchor-b detection pairing that spans a usable frame.
    /// Coincident centroids are skipped, not reported.
    fn anchor_pairings(&self) -> Vec<AnchorPairing> {
        let a_part = &self.parts[&self.config.anchor_a];
        let b_part = &self.parts[&self.config.anchor_b];
        let mut pairings = Vec::new();
        for (a_index, a) in a_part.detections().iter().enumerate() {
            for (b_index, b) in b_part.detections().iter().enumerate() {
                match AnchorFrame::between(a.centroid, b.centroid) {
                    Some(frame) => pairings.push(AnchorPairing {
                        frame,
                        a_index,
                        b_index,
                    }),
                    None => {
                        tracing::debug!(a_index, b_index, "skipping coincident anchor pairing")
                    }
                }
            }
        }
        pairings
    }

    /// Record the invariant pose of every detection containing `(x, y)`,
    /// under every pairing. Detections serving as an anchor of the current
    /// pairing are excluded; their pose in their own frame is degenerate.
    fn teach_at(&mut self, pairings: &[AnchorPairing], x: i32, y: i32) -> bool {
        let mut additions: Vec<(String, InvariantPose)> = Vec::new();
        for pairing in pairings {
            for (name, part) in &self.parts {
                for (index, detection) in part.detections().iter().enumerate() {
                    let is_anchor_of_pairing = (name == &self.config.anchor_a
                        && index == pairing.a_index)
                        || (name == &self.config.anchor_b && index == pairing.b_index);
                    if is_anchor_of_pairing || !detection.contains(x, y) {
                        continue;
                    }
                    additions
                        .push((name.clone(), pairing.frame.project(detection.centroid, detection.size)));
                }
            }
        }
        let taught = !additions.is_empty();
        if taught {
            tracing::info!(x, y, poses = additions.len(), "pose taught");
        } else {
            tracing::info!(x, y, "teach click hit no detection");
        }
        for (name, pose) in additions {
            if let Some(part) = self.parts.get_mut(&name) {
                part.add_taught_pose(pose);
            }
        }
        taught
    }

    /// Flag detections whose invariant pose, under any pairing, is within
    /// tolerance of one of their part's taught poses. Each detection is
    /// reported at most once.
    fn match_taught(&self, pairings: &[AnchorPairing], canvas: &mut RgbImage) -> Vec<PartMatch> {
        let mut matched: BTreeSet<(String, usize)> = BTreeSet::new();
        let mut matches = Vec::new();
        for pairing in pairings {
            for (name, part) in &self.parts {
                for (index, detection) in part.detections().iter().enumerate() {
                    if matched.contains(&(name.clone(), index)) {
                        continue;
                    }
                    let pose = pairing.frame.project(detection.centroid, detection.size);
                    let hit = part
                        .taught_poses()
                        .iter()
                        .any(|taught| poses_match(taught, &pose, self.config.match_tolerance));
                    if hit {
                        matched.insert((name.clone(), index));
                        overlay::draw_match_marker(canvas, detection);
                        matches.push(PartMatch {
                            part: name.clone(),
                            centroid: [detection.centroid.x, detection.centroid.y],
                            size: detection.size,
                            pose,
                        });
                    }
                }
            }
        }
        matches
    }

    // ── Persistence ────────────────────────────────────────────────────────

    /// Rebuild a composite from stored data, reconciling against the given
    /// part list: parts missing from the data start untrained, stored parts
    /// not in the list are dropped.
    pub fn from_data<I, S>(
        part_names: I,
        config: CompositeConfig,
        mut data: ModelData,
    ) -> Result<Self, CompositeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut composite = Self::new(part_names, config)?;
        for (name, part) in composite.parts.iter_mut() {
            if let Some(stored) = data.remove(name) {
                *part = PartModel::from_data(name.clone(), stored).map_err(|source| {
                    CompositeError::PartLoad {
                        name: name.clone(),
                        source,
                    }
                })?;
            } else {
                tracing::warn!(part = %name, "no stored data, part starts untrained");
            }
        }
        for name in data.keys() {
            tracing::warn!(part = %name, "stored part not in the composite, dropped");
        }
        Ok(composite)
    }

    /// Snapshot all parts' persistent state.
    pub fn to_data(&self) -> ModelData {
        self.parts
            .iter()
            .map(|(name, part)| (name.clone(), part.to_data()))
            .collect()
    }
}
