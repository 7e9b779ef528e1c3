use crate::error::ConfigError;
use anyhow::{Context, Result};
use glam::DVec3;
use helpers::general::lin_interp;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Number of samples used for the arc length lookup table of a course curve.
const ARC_LENGTH_DIVISIONS: usize = 200;

/// Step used for the finite difference tangent approximation (in curve parameter units).
const TANGENT_DELTA: f64 = 1e-4;

/// TrackCurve maps the normalized course parameter t (fraction of the course length) to world
/// positions. All methods treat t as periodic, i.e. t = 1.25 is the same point as t = 0.25.
pub trait TrackCurve: std::fmt::Debug + Send + Sync {
    fn point_at(&self, t: f64) -> DVec3;

    /// Unit length direction of travel at t.
    fn tangent_at(&self, t: f64) -> DVec3;

    fn length(&self) -> f64;

    /// Horizontal unit vector pointing to the left of the direction of travel.
    fn normal_at(&self, t: f64) -> DVec3 {
        let tan = self.tangent_at(t);
        DVec3::new(-tan.z, 0.0, tan.x).normalize_or_zero()
    }
}

/// Built-in course layouts. All control points lie in the ground plane (y = 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoursePreset {
    ClassicCircuit,
    ForestOval,
    DragonsLongRun,
    CrescentMile,
}

impl CoursePreset {
    pub const ALL: [CoursePreset; 4] = [
        CoursePreset::ClassicCircuit,
        CoursePreset::ForestOval,
        CoursePreset::DragonsLongRun,
        CoursePreset::CrescentMile,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CoursePreset::ClassicCircuit => "Classic Circuit",
            CoursePreset::ForestOval => "Forest Oval",
            CoursePreset::DragonsLongRun => "Dragon's Long Run",
            CoursePreset::CrescentMile => "Crescent Mile",
        }
    }

    pub fn control_points(&self) -> Vec<DVec3> {
        let xz: &[(f64, f64)] = match self {
            CoursePreset::ClassicCircuit => &[
                (200.0, 0.0),
                (180.0, 80.0),
                (100.0, 120.0),
                (-50.0, 100.0),
                (-150.0, 40.0),
                (-220.0, 0.0),
                (-180.0, -80.0),
                (-50.0, -120.0),
                (50.0, -80.0),
                (150.0, -60.0),
                (200.0, 0.0),
            ],
            CoursePreset::ForestOval => &[
                (200.0, 0.0),
                (200.0, 80.0),
                (0.0, 120.0),
                (-200.0, 80.0),
                (-200.0, 0.0),
                (-200.0, -80.0),
                (0.0, -120.0),
                (200.0, -80.0),
                (200.0, 0.0),
            ],
            CoursePreset::DragonsLongRun => &[
                (200.0, 0.0),
                (250.0, 100.0),
                (150.0, 180.0),
                (0.0, 150.0),
                (-100.0, 200.0),
                (-250.0, 120.0),
                (-320.0, 0.0),
                (-280.0, -150.0),
                (-100.0, -100.0),
                (0.0, -160.0),
                (120.0, -120.0),
                (200.0, 0.0),
            ],
            CoursePreset::CrescentMile => &[
                (200.0, 0.0),
                (220.0, 60.0),
                (140.0, 120.0),
                (40.0, 140.0),
                (-60.0, 120.0),
                (-160.0, 80.0),
                (-220.0, 0.0),
                (-160.0, -80.0),
                (-40.0, -140.0),
                (80.0, -120.0),
                (180.0, -60.0),
                (200.0, 0.0),
            ],
        };
        xz.iter().map(|&(x, z)| DVec3::new(x, 0.0, z)).collect()
    }
}

/// * `preset` - Built-in course layout, used if no CSV file is given
/// * `csv_path` - (optional) CSV file containing the control points of a custom course
/// (columns `x_m` and `y_m`, ground plane coordinates)
/// * `name` - (optional) Display name of a custom course
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CoursePars {
    #[serde(default = "default_preset")]
    pub preset: CoursePreset,
    #[serde(default)]
    pub csv_path: Option<PathBuf>,
    #[serde(default)]
    pub name: Option<String>,
}

fn default_preset() -> CoursePreset {
    CoursePreset::ClassicCircuit
}

impl Default for CoursePars {
    fn default() -> Self {
        CoursePars {
            preset: default_preset(),
            csv_path: None,
            name: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CsvTrackEl {
    pub x_m: f64,
    pub y_m: f64,
}

/// read_control_points loads the control points of a custom course from a CSV file. The 2D track
/// coordinates are mapped onto the ground plane (x -> x, y -> z).
pub fn read_control_points(filepath: &Path) -> Result<Vec<DVec3>> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!(
            "Failed to open course file {}!",
            filepath.to_str().unwrap_or("unknown")
        ))?;

    let mut csv_reader = csv::Reader::from_reader(&fh);
    let mut points = vec![];

    for result in csv_reader.deserialize() {
        let csv_track_el: CsvTrackEl = result.context(format!(
            "Failed to parse course file {}!",
            filepath.to_str().unwrap_or("unknown")
        ))?;
        points.push(DVec3::new(csv_track_el.x_m, 0.0, csv_track_el.y_m));
    }

    Ok(points)
}

/// Cubic polynomial of one segment of the spline (vector valued coefficients).
#[derive(Debug, Clone, Copy)]
struct CubicPoly {
    c0: DVec3,
    c1: DVec3,
    c2: DVec3,
    c3: DVec3,
}

impl CubicPoly {
    /// Nonuniform Catmull-Rom segment between x1 and x2, dt* being the knot intervals.
    fn nonuniform(x0: DVec3, x1: DVec3, x2: DVec3, x3: DVec3, dt0: f64, dt1: f64, dt2: f64) -> Self {
        let t1 = ((x1 - x0) / dt0 - (x2 - x0) / (dt0 + dt1) + (x2 - x1) / dt1) * dt1;
        let t2 = ((x2 - x1) / dt1 - (x3 - x1) / (dt1 + dt2) + (x3 - x2) / dt2) * dt1;

        CubicPoly {
            c0: x1,
            c1: t1,
            c2: -3.0 * x1 + 3.0 * x2 - 2.0 * t1 - t2,
            c3: 2.0 * x1 - 2.0 * x2 + t1 + t2,
        }
    }

    fn calc(&self, t: f64) -> DVec3 {
        self.c0 + self.c1 * t + self.c2 * (t * t) + self.c3 * (t * t * t)
    }
}

/// CourseCurve is a closed centripetal Catmull-Rom spline through the course control points. It
/// is parameterized by arc length, i.e. t = 0.5 is always half way around the course.
#[derive(Debug, Clone)]
pub struct CourseCurve {
    pub name: String,
    points: Vec<DVec3>,
    segments: Vec<CubicPoly>,
    // cumulated arc lengths at u = i / ARC_LENGTH_DIVISIONS
    arc_lengths: Vec<f64>,
    arc_params: Vec<f64>,
}

impl CourseCurve {
    pub fn new(name: &str, control_points: &[DVec3]) -> Result<CourseCurve, ConfigError> {
        if let Some(idx) = control_points.iter().position(|p| !p.is_finite()) {
            return Err(ConfigError::NonFiniteControlPoint { idx });
        }

        // drop consecutive duplicates and the closing point if it repeats the first one
        let mut points: Vec<DVec3> = Vec::with_capacity(control_points.len());
        for p in control_points.iter() {
            if points.last().map_or(true, |last| last.distance(*p) > 1e-9) {
                points.push(*p);
            }
        }
        while points.len() > 1 && points[0].distance(points[points.len() - 1]) <= 1e-9 {
            points.pop();
        }

        if points.len() < 3 {
            return Err(ConfigError::TooFewControlPoints(points.len()));
        }

        let no_points = points.len();
        let mut segments = Vec::with_capacity(no_points);

        for i in 0..no_points {
            let p0 = points[(i + no_points - 1) % no_points];
            let p1 = points[i];
            let p2 = points[(i + 1) % no_points];
            let p3 = points[(i + 2) % no_points];

            // centripetal parameterization
            let mut dt0 = p0.distance_squared(p1).powf(0.25);
            let mut dt1 = p1.distance_squared(p2).powf(0.25);
            let mut dt2 = p2.distance_squared(p3).powf(0.25);

            if dt1 < 1e-4 {
                dt1 = 1.0;
            }
            if dt0 < 1e-4 {
                dt0 = dt1;
            }
            if dt2 < 1e-4 {
                dt2 = dt1;
            }

            segments.push(CubicPoly::nonuniform(p0, p1, p2, p3, dt0, dt1, dt2));
        }

        let mut curve = CourseCurve {
            name: name.to_owned(),
            points,
            segments,
            arc_lengths: Vec::with_capacity(ARC_LENGTH_DIVISIONS + 1),
            arc_params: Vec::with_capacity(ARC_LENGTH_DIVISIONS + 1),
        };

        // create arc length lookup table
        let mut prev = curve.raw_point(0.0);
        let mut sum = 0.0;
        curve.arc_lengths.push(0.0);
        curve.arc_params.push(0.0);

        for i in 1..=ARC_LENGTH_DIVISIONS {
            let u = i as f64 / ARC_LENGTH_DIVISIONS as f64;
            let cur = curve.raw_point(u);
            sum += cur.distance(prev);
            curve.arc_lengths.push(sum);
            curve.arc_params.push(u);
            prev = cur;
        }

        if !(sum > 1e-6) {
            return Err(ConfigError::ZeroLengthCourse);
        }

        Ok(curve)
    }

    pub fn from_preset(preset: CoursePreset) -> Result<CourseCurve, ConfigError> {
        CourseCurve::new(preset.name(), &preset.control_points())
    }

    /// from_pars creates the course either from the CSV file (if given) or from the preset.
    pub fn from_pars(course_pars: &CoursePars) -> Result<CourseCurve> {
        let curve = if let Some(csv_path) = &course_pars.csv_path {
            let points = read_control_points(csv_path)?;
            let name = course_pars
                .name
                .to_owned()
                .unwrap_or_else(|| csv_path.to_string_lossy().into_owned());
            CourseCurve::new(&name, &points)?
        } else {
            CourseCurve::from_preset(course_pars.preset)?
        };
        Ok(curve)
    }

    pub fn control_points(&self) -> &[DVec3] {
        &self.points
    }

    /// raw_point evaluates the spline at the (non arc length) curve parameter u in [0.0, 1.0].
    fn raw_point(&self, u: f64) -> DVec3 {
        let no_segments = self.segments.len();
        let p = u.clamp(0.0, 1.0) * no_segments as f64;
        let mut idx = p.floor() as usize;
        let mut weight = p - idx as f64;

        if idx >= no_segments {
            idx = no_segments - 1;
            weight = 1.0;
        }

        self.segments[idx].calc(weight)
    }

    /// arc_to_param converts the course fraction t into the curve parameter u.
    fn arc_to_param(&self, t: f64) -> f64 {
        let target = wrap_unit(t) * self.length();
        lin_interp(target, &self.arc_lengths, &self.arc_params)
    }
}

impl TrackCurve for CourseCurve {
    fn point_at(&self, t: f64) -> DVec3 {
        self.raw_point(self.arc_to_param(t))
    }

    fn tangent_at(&self, t: f64) -> DVec3 {
        let u = self.arc_to_param(t);
        let u1 = (u - TANGENT_DELTA).max(0.0);
        let u2 = (u + TANGENT_DELTA).min(1.0);
        (self.raw_point(u2) - self.raw_point(u1)).normalize_or_zero()
    }

    fn length(&self) -> f64 {
        *self.arc_lengths.last().unwrap_or(&0.0)
    }
}

/// wrap_unit maps any finite value into [0.0, 1.0).
pub fn wrap_unit(t: f64) -> f64 {
    let w = t.rem_euclid(1.0);
    if w >= 1.0 {
        0.0
    } else {
        w
    }
}

/// lane_position returns the world position of an entrant at course fraction t, shifted sideways
/// by its lane offset and slightly backwards so the nose sits on the line.
pub fn lane_position(track: &dyn TrackCurve, t: f64, lane_offset: f64) -> DVec3 {
    let tangent = track.tangent_at(t);
    let normal = track.normal_at(t);
    track.point_at(t) + normal * lane_offset - tangent * 1.5
}
