use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose, Engine as _};
use chrono::{SecondsFormat, Utc};
use facelock_config::ResolvedConfig;
use facelock_core::faces::{
    aggregate, validate_position, validate_position_collection, AdaptiveMatcher, Embedding,
    EmbeddingExtractor, EmbeddingKind, FacialProfile, GalleryEntry, MatchDecision, Position,
    SimilarityScorer,
};
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::cli::{EnrollArgs, ExtractArgs, IdentifyArgs, PoseArgs, VerifyArgs};
use crate::config;
use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionSummary {
    pub input: String,
    pub kind: EmbeddingKind,
    pub embedding_len: usize,
    pub embedding: Embedding,
    pub output_path: Option<String>,
}

#[derive(Debug)]
pub struct ExtractionOutcome {
    pub summary: ExtractionSummary,
    pub logs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentSummary {
    pub profile_path: String,
    pub sample_count: usize,
    pub submitted: usize,
    pub embedding_len: usize,
    pub enrolled_at: String,
}

#[derive(Debug)]
pub struct EnrollmentOutcome {
    pub summary: EnrollmentSummary,
    pub logs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationSummary {
    pub profile_path: String,
    pub matched: bool,
    pub face_matched: bool,
    pub decision: Option<MatchDecision>,
    pub pose_matched: Option<bool>,
    pub failed_attempts: u32,
    pub checked_at: String,
}

#[derive(Debug)]
pub struct VerificationOutcome {
    pub summary: VerificationSummary,
    pub logs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentificationSummary {
    pub gallery: String,
    pub candidates: usize,
    pub identity: Option<String>,
    pub distance: Option<f32>,
    pub confidence: f32,
}

#[derive(Debug)]
pub struct IdentificationOutcome {
    pub summary: IdentificationSummary,
    pub logs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PoseSummary {
    pub stored: Position,
    pub live: Position,
    pub matched: bool,
}

#[derive(Debug)]
pub struct PoseOutcome {
    pub summary: PoseSummary,
    pub logs: Vec<String>,
}

pub fn run_extract(args: &ExtractArgs) -> AppResult<ExtractionOutcome> {
    let resolved = config::load_resolved()?;
    let extractor = config::build_extractor(&resolved, &args.encoder)?;
    run_extract_with(&extractor, args)
}

pub fn run_extract_with(
    extractor: &EmbeddingExtractor,
    args: &ExtractArgs,
) -> AppResult<ExtractionOutcome> {
    let mut logs = Vec::new();
    let payload = read_payload(&args.image, args.payload)?;
    logs.push(format!(
        "Loaded {} ({} payload bytes)",
        args.image.display(),
        payload.len()
    ));

    let embedding = extractor
        .extract(&payload)
        .ok_or_else(|| AppError::NoEmbedding {
            path: args.image.clone(),
        })?;
    logs.push(format!(
        "Extracted {:?} embedding with {} values",
        embedding.kind(),
        embedding.len()
    ));

    let summary = ExtractionSummary {
        input: args.image.display().to_string(),
        kind: embedding.kind(),
        embedding_len: embedding.len(),
        embedding,
        output_path: args.output.as_ref().map(|path| path.display().to_string()),
    };

    if let Some(output) = &args.output {
        write_json_atomic(output, &summary)?;
        logs.push(format!("Saved embedding to {}", output.display()));
    }

    Ok(ExtractionOutcome { summary, logs })
}

pub fn run_enroll(args: &EnrollArgs) -> AppResult<EnrollmentOutcome> {
    let resolved = config::load_resolved()?;
    let extractor = config::build_extractor(&resolved, &args.encoder)?;
    run_enroll_with(&extractor, args)
}

pub fn run_enroll_with(
    extractor: &EmbeddingExtractor,
    args: &EnrollArgs,
) -> AppResult<EnrollmentOutcome> {
    let mut logs = Vec::new();
    let payloads = args
        .samples
        .iter()
        .map(|path| read_payload(path, args.payload))
        .collect::<AppResult<Vec<_>>>()?;
    logs.push(format!("Loaded {} sample(s)", payloads.len()));

    let aggregated = aggregate(extractor, &payloads)?;
    logs.push(format!(
        "Aggregated {} of {} sample(s) into a {}-value reference",
        aggregated.sample_count,
        aggregated.submitted,
        aggregated.embedding.len()
    ));

    let mut profile = if args.profile.exists() {
        load_profile(&args.profile)?
    } else {
        logs.push(format!("Creating new profile {}", args.profile.display()));
        FacialProfile::default()
    };
    profile.enroll(&aggregated);
    profile.reset_failed_attempts();
    write_json_atomic(&args.profile, &profile)?;
    logs.push(format!("Profile written to {}", args.profile.display()));

    Ok(EnrollmentOutcome {
        summary: EnrollmentSummary {
            profile_path: args.profile.display().to_string(),
            sample_count: aggregated.sample_count,
            submitted: aggregated.submitted,
            embedding_len: aggregated.embedding.len(),
            enrolled_at: timestamp(),
        },
        logs,
    })
}

pub fn run_verify(args: &VerifyArgs) -> AppResult<VerificationOutcome> {
    let resolved = config::load_resolved()?;
    let extractor = config::build_extractor(&resolved, &args.encoder)?;
    run_verify_with(&extractor, args)
}

pub fn run_verify_with(
    extractor: &EmbeddingExtractor,
    args: &VerifyArgs,
) -> AppResult<VerificationOutcome> {
    let mut logs = Vec::new();
    let mut profile = load_profile(&args.profile)?;
    logs.push(format!(
        "Loaded profile {} ({} sample(s), {} failed attempt(s))",
        args.profile.display(),
        profile.sample_count(),
        profile.failed_attempts
    ));

    let matcher = AdaptiveMatcher::new(SimilarityScorer::new(extractor.has_encoder()));
    let payload = read_payload(&args.image, args.payload)?;
    let decision = match extractor.extract(&payload) {
        Some(live) => matcher.decide_for_user(&profile, &live),
        None => {
            logs.push("No embedding could be extracted from the live image".to_string());
            None
        }
    };
    let face_matched = decision.map(|d| d.matched).unwrap_or(false);
    if let Some(decision) = &decision {
        logs.push(format!(
            "Face {:?} {:.4} against threshold {:.4}: {}",
            decision.metric,
            decision.score,
            decision.threshold,
            if decision.matched { "match" } else { "no match" }
        ));
    }

    let pose_matched = match &args.pose {
        Some(path) => {
            let live_pose = load_position(path)?;
            let ok = validate_position_collection(&profile, Some(&live_pose));
            logs.push(format!(
                "Pose check against {} stored position(s): {}",
                profile.effective_positions().len(),
                if ok { "consistent" } else { "inconsistent" }
            ));
            Some(ok)
        }
        None => None,
    };

    let matched = face_matched && pose_matched.unwrap_or(true);
    if args.track_attempts {
        if matched {
            profile.reset_failed_attempts();
        } else {
            profile.record_failed_attempt();
        }
        write_json_atomic(&args.profile, &profile)?;
        logs.push(format!(
            "Failed-attempt counter now {}",
            profile.failed_attempts
        ));
    }

    Ok(VerificationOutcome {
        summary: VerificationSummary {
            profile_path: args.profile.display().to_string(),
            matched,
            face_matched,
            decision,
            pose_matched,
            failed_attempts: profile.failed_attempts,
            checked_at: timestamp(),
        },
        logs,
    })
}

pub fn run_identify(args: &IdentifyArgs) -> AppResult<IdentificationOutcome> {
    let resolved = config::load_resolved()?;
    let extractor = config::build_extractor(&resolved, &args.encoder)?;
    run_identify_with(&resolved, &extractor, args)
}

pub fn run_identify_with(
    config: &ResolvedConfig,
    extractor: &EmbeddingExtractor,
    args: &IdentifyArgs,
) -> AppResult<IdentificationOutcome> {
    let mut logs = Vec::new();
    let gallery_dir = args
        .gallery
        .clone()
        .unwrap_or_else(|| config.profile_dir.clone());
    let gallery = load_gallery(&gallery_dir)?;
    logs.push(format!(
        "Loaded {} gallery candidate(s) from {}",
        gallery.len(),
        gallery_dir.display()
    ));

    let payload = read_payload(&args.image, args.payload)?;
    let live = extractor
        .extract(&payload)
        .ok_or_else(|| AppError::NoEmbedding {
            path: args.image.clone(),
        })?;

    let tolerance = args.tolerance.unwrap_or(config.gallery_tolerance);
    let matcher = AdaptiveMatcher::new(SimilarityScorer::new(extractor.has_encoder()))
        .with_gallery_tolerance(tolerance);
    let result = matcher.match_against_gallery(&gallery, &live);
    match &result.identity {
        Some(identity) => logs.push(format!(
            "Best match {identity} at distance {:.4} (confidence {:.4})",
            result.distance,
            result.confidence()
        )),
        None => logs.push("No gallery candidate within tolerance".to_string()),
    }

    Ok(IdentificationOutcome {
        summary: IdentificationSummary {
            gallery: gallery_dir.display().to_string(),
            candidates: gallery.len(),
            distance: result.is_match().then_some(result.distance),
            confidence: result.confidence(),
            identity: result.identity,
        },
        logs,
    })
}

pub fn run_pose(args: &PoseArgs) -> AppResult<PoseOutcome> {
    let stored = load_position(&args.stored)?;
    let live = load_position(&args.live)?;
    let matched = validate_position(&stored, &live);
    let logs = vec![format!(
        "Positions {} within fixed tolerances",
        if matched { "agree" } else { "do not agree" }
    )];
    Ok(PoseOutcome {
        summary: PoseSummary {
            stored,
            live,
            matched,
        },
        logs,
    })
}

/// Reads an input as a payload string: payload files verbatim, images as base64.
pub fn read_payload(path: &Path, is_payload: bool) -> AppResult<String> {
    if is_payload {
        let text = fs::read_to_string(path).map_err(|err| input_error(path, err))?;
        Ok(text.trim().to_string())
    } else {
        let bytes = fs::read(path).map_err(|err| input_error(path, err))?;
        Ok(general_purpose::STANDARD.encode(bytes))
    }
}

fn input_error(path: &Path, err: io::Error) -> AppError {
    if err.kind() == io::ErrorKind::NotFound {
        AppError::MissingInput {
            path: path.to_path_buf(),
        }
    } else {
        AppError::InputRead {
            path: path.to_path_buf(),
            source: err,
        }
    }
}

pub fn load_profile(path: &Path) -> AppResult<FacialProfile> {
    let data = fs::read(path).map_err(|err| input_error(path, err))?;
    serde_json::from_slice(&data).map_err(|err| AppError::InvalidProfile {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

pub fn load_position(path: &Path) -> AppResult<Position> {
    let data = fs::read(path).map_err(|err| input_error(path, err))?;
    let position: Position =
        serde_json::from_slice(&data).map_err(|err| AppError::InvalidPosition {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
    if position.is_empty() {
        return Err(AppError::InvalidPosition {
            path: path.to_path_buf(),
            message: "expected {x, y, scale} or {roll, pitch, yaw, dist}".into(),
        });
    }
    Ok(position)
}

/// Loads every `*.json` profile in `dir`, ordered by file name. The file stem
/// is the identity; profiles without any reference embedding are skipped.
pub fn load_gallery(dir: &Path) -> AppResult<Vec<GalleryEntry<String>>> {
    let entries = fs::read_dir(dir).map_err(|err| input_error(dir, err))?;
    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|source| AppError::FeatureRead {
                path: dir.to_path_buf(),
                source,
            })?
            .path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut gallery = Vec::with_capacity(paths.len());
    for path in paths {
        let profile = load_profile(&path)?;
        let Some(identity) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        let Some(embedding) = profile.gallery_embedding() else {
            tracing::debug!(path = %path.display(), "profile has no reference embedding");
            continue;
        };
        gallery.push(GalleryEntry {
            identity: identity.to_string(),
            embedding: embedding.clone(),
            active: profile.active,
        });
    }
    Ok(gallery)
}

/// Writes `value` as pretty JSON through a temp file in the same directory so
/// readers never observe a half-written profile.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> AppResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|source| AppError::FeatureWrite {
        path: parent.to_path_buf(),
        source,
    })?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|source| AppError::FeatureWrite {
        path: path.to_path_buf(),
        source,
    })?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer
            .write_all(b"\n")
            .and_then(|_| writer.flush())
            .map_err(|source| AppError::FeatureWrite {
                path: path.to_path_buf(),
                source,
            })?;
    }
    tmp.persist(path).map_err(|err| AppError::FeatureWrite {
        path: path.to_path_buf(),
        source: err.error,
    })?;
    Ok(())
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
