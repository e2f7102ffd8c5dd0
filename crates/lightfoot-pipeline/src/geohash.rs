//! Geohash codec.
//!
//! Encodes latitude/longitude pairs into base-32 geohash strings, decodes
//! them back into bounding cells, and walks to adjacent cells.
//!
//! Bits are interleaved starting with longitude. Each output symbol carries
//! five bits, so the axis refined first flips with every character; that is
//! why the neighbour tables depend on the parity of the hash length.

use std::fmt;

use thiserror::Error;

/// Geohash alphabet, indexed by 5-bit value.
pub const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Precision used by [`encode_default`].
pub const DEFAULT_PRECISION: usize = 12;

const BITS: [u8; 5] = [16, 8, 4, 2, 1];

// Even-parity tables, ordered as `Direction::index`: right, left, top, bottom.
const EVEN_NEIGHBORS: [&str; 4] = [
    "bc01fg45238967deuvhjyznpkmstqrwx",
    "238967debc01fg45kmstqrwxuvhjyznp",
    "p0r21436x8zb9dcf5h7kjnmqesgutwvy",
    "14365h7k9dcfesgujnmqp0r2twvyx8zb",
];

const EVEN_BORDERS: [&str; 4] = ["bcfguvyz", "0145hjnp", "prxz", "028b"];

// Indexed by `Parity::index`, then `Direction::index`.
const NEIGHBORS: [[&str; 4]; 2] = [EVEN_NEIGHBORS, derive_odd(EVEN_NEIGHBORS)];
const BORDERS: [[&str; 4]; 2] = [EVEN_BORDERS, derive_odd(EVEN_BORDERS)];

/// Errors produced by the geohash codec.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeohashError {
    #[error("geohash is empty")]
    Empty,
    #[error("invalid geohash character: {0:?}")]
    InvalidCharacter(char),
    #[error("latitude out of range [-90, 90]: {0}")]
    InvalidLatitude(f64),
    #[error("longitude out of range [-180, 180]: {0}")]
    InvalidLongitude(f64),
}

/// Direction of an adjacent cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Right,
    Left,
    Top,
    Bottom,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Right,
        Direction::Left,
        Direction::Top,
        Direction::Bottom,
    ];

    const fn index(self) -> usize {
        match self {
            Direction::Right => 0,
            Direction::Left => 1,
            Direction::Top => 2,
            Direction::Bottom => 3,
        }
    }

    /// The direction whose even-parity table is used for this direction at
    /// odd parity. Adding a character swaps the bisected axis, so the lookup
    /// transposes across the diagonal.
    pub const fn transposed(self) -> Direction {
        match self {
            Direction::Bottom => Direction::Left,
            Direction::Top => Direction::Right,
            Direction::Left => Direction::Bottom,
            Direction::Right => Direction::Top,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Right => write!(f, "right"),
            Direction::Left => write!(f, "left"),
            Direction::Top => write!(f, "top"),
            Direction::Bottom => write!(f, "bottom"),
        }
    }
}

/// Parity of a geohash length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    Even,
    Odd,
}

impl Parity {
    pub fn of(len: usize) -> Self {
        if len % 2 == 0 {
            Parity::Even
        } else {
            Parity::Odd
        }
    }

    const fn index(self) -> usize {
        match self {
            Parity::Even => 0,
            Parity::Odd => 1,
        }
    }
}

const fn derive_odd(even: [&'static str; 4]) -> [&'static str; 4] {
    [
        even[Direction::Right.transposed().index()],
        even[Direction::Left.transposed().index()],
        even[Direction::Top.transposed().index()],
        even[Direction::Bottom.transposed().index()],
    ]
}

/// Neighbour substitution table for a direction and parity.
pub fn neighbor_table(direction: Direction, parity: Parity) -> &'static str {
    NEIGHBORS[parity.index()][direction.index()]
}

/// Border characters for a direction and parity.
pub fn border_table(direction: Direction, parity: Parity) -> &'static str {
    BORDERS[parity.index()][direction.index()]
}

/// A closed interval on one axis with its midpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub min: f64,
    pub max: f64,
    pub center: f64,
}

impl Interval {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            center: (min + max) / 2.0,
        }
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// The bounding cell described by a geohash.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoCell {
    pub latitude: Interval,
    pub longitude: Interval,
}

impl GeoCell {
    /// Centre as `(latitude, longitude)`.
    pub fn center(&self) -> (f64, f64) {
        (self.latitude.center, self.longitude.center)
    }

    /// Centre as a GeoJSON position, `[longitude, latitude]`.
    pub fn lng_lat(&self) -> [f64; 2] {
        [self.longitude.center, self.latitude.center]
    }

    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        self.latitude.contains(latitude) && self.longitude.contains(longitude)
    }
}

/// The eight cells surrounding a geohash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbors {
    pub n: String,
    pub ne: String,
    pub e: String,
    pub se: String,
    pub s: String,
    pub sw: String,
    pub w: String,
    pub nw: String,
}

fn symbol_value(c: char) -> Result<u8, GeohashError> {
    let lower = c.to_ascii_lowercase();
    BASE32
        .iter()
        .position(|&b| b as char == lower)
        .map(|i| i as u8)
        .ok_or(GeohashError::InvalidCharacter(c))
}

fn refine(interval: &mut [f64; 2], cd: u8, mask: u8) {
    let mid = (interval[0] + interval[1]) / 2.0;
    if cd & mask != 0 {
        interval[0] = mid;
    } else {
        interval[1] = mid;
    }
}

/// Encode a coordinate into a geohash of `precision` characters.
///
/// A precision of zero yields an empty string.
pub fn encode(latitude: f64, longitude: f64, precision: usize) -> Result<String, GeohashError> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(GeohashError::InvalidLatitude(latitude));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(GeohashError::InvalidLongitude(longitude));
    }

    let mut lat = (-90.0_f64, 90.0_f64);
    let mut lon = (-180.0_f64, 180.0_f64);
    let mut hash = String::with_capacity(precision);
    let mut is_even = true;
    let mut bit = 0;
    let mut ch = 0u8;

    while hash.len() < precision {
        let (range, value) = if is_even {
            (&mut lon, longitude)
        } else {
            (&mut lat, latitude)
        };
        let mid = (range.0 + range.1) / 2.0;
        if value > mid {
            ch |= BITS[bit];
            range.0 = mid;
        } else {
            range.1 = mid;
        }

        is_even = !is_even;
        if bit < 4 {
            bit += 1;
        } else {
            hash.push(BASE32[ch as usize] as char);
            bit = 0;
            ch = 0;
        }
    }

    Ok(hash)
}

/// Encode with [`DEFAULT_PRECISION`].
pub fn encode_default(latitude: f64, longitude: f64) -> Result<String, GeohashError> {
    encode(latitude, longitude, DEFAULT_PRECISION)
}

/// Decode a geohash into its bounding cell. Input is case-insensitive.
pub fn decode(hash: &str) -> Result<GeoCell, GeohashError> {
    if hash.is_empty() {
        return Err(GeohashError::Empty);
    }

    let mut lat = [-90.0, 90.0];
    let mut lon = [-180.0, 180.0];
    let mut is_even = true;

    for c in hash.chars() {
        let cd = symbol_value(c)?;
        for mask in BITS {
            if is_even {
                refine(&mut lon, cd, mask);
            } else {
                refine(&mut lat, cd, mask);
            }
            is_even = !is_even;
        }
    }

    Ok(GeoCell {
        latitude: Interval::new(lat[0], lat[1]),
        longitude: Interval::new(lon[0], lon[1]),
    })
}

/// Compute the cell adjacent to `hash` in `direction`.
///
/// Crossing a parent cell boundary moves the prefix as well. At the top
/// level the tables wrap around, so walking off the edge of the map lands
/// on the opposite side.
pub fn adjacent(hash: &str, direction: Direction) -> Result<String, GeohashError> {
    let hash = hash.to_ascii_lowercase();
    for c in hash.chars() {
        symbol_value(c)?;
    }
    let last = hash.chars().last().ok_or(GeohashError::Empty)?;
    let parity = Parity::of(hash.len());
    let prefix = &hash[..hash.len() - 1];

    let mut base = if border_table(direction, parity).contains(last) && !prefix.is_empty() {
        adjacent(prefix, direction)?
    } else {
        prefix.to_string()
    };

    let index = neighbor_table(direction, parity)
        .find(last)
        .ok_or(GeohashError::InvalidCharacter(last))?;
    base.push(BASE32[index] as char);
    Ok(base)
}

/// All eight neighbours of `hash`.
pub fn neighbors(hash: &str) -> Result<Neighbors, GeohashError> {
    let n = adjacent(hash, Direction::Top)?;
    let s = adjacent(hash, Direction::Bottom)?;
    let e = adjacent(hash, Direction::Right)?;
    let w = adjacent(hash, Direction::Left)?;

    Ok(Neighbors {
        ne: adjacent(&n, Direction::Right)?,
        nw: adjacent(&n, Direction::Left)?,
        se: adjacent(&s, Direction::Right)?,
        sw: adjacent(&s, Direction::Left)?,
        n,
        s,
        e,
        w,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_points() {
        assert_eq!(encode(52.52, 13.405, 5).unwrap(), "u33dc");
        assert_eq!(encode(57.64911, 10.40744, 11).unwrap(), "u4pruydqqvj");
        assert_eq!(encode(0.0, 0.0, 0).unwrap(), "");
    }

    #[test]
    fn test_encode_rejects_out_of_range() {
        assert!(matches!(
            encode(90.5, 0.0, 5),
            Err(GeohashError::InvalidLatitude(_))
        ));
        assert!(matches!(
            encode(0.0, -180.1, 5),
            Err(GeohashError::InvalidLongitude(_))
        ));
        assert!(matches!(
            encode(f64::NAN, 0.0, 5),
            Err(GeohashError::InvalidLatitude(_))
        ));
    }

    #[test]
    fn test_encode_accepts_bounds() {
        assert_eq!(encode(90.0, 180.0, 3).unwrap(), "zzz");
        assert_eq!(encode(-90.0, -180.0, 3).unwrap(), "000");
    }

    #[test]
    fn test_decode_berlin() {
        let cell = decode("u33dc").unwrap();
        let (lat, lon) = cell.center();
        assert!((lat - 52.52).abs() < 0.03, "lat {lat}");
        assert!((lon - 13.405).abs() < 0.03, "lon {lon}");
        assert!(cell.contains(52.52, 13.405));
        assert_eq!(cell.lng_lat(), [lon, lat]);
    }

    #[test]
    fn test_decode_is_case_insensitive() {
        assert_eq!(decode("U33DC").unwrap(), decode("u33dc").unwrap());
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert_eq!(decode(""), Err(GeohashError::Empty));
        assert_eq!(decode("u33a"), Err(GeohashError::InvalidCharacter('a')));
        assert_eq!(decode("u3 3"), Err(GeohashError::InvalidCharacter(' ')));
    }

    #[test]
    fn test_decode_intervals_are_ordered_and_shrink() {
        let hash = "u4pruydqqvj";
        let mut previous: Option<GeoCell> = None;
        for len in 1..=hash.len() {
            let cell = decode(&hash[..len]).unwrap();
            for axis in [cell.latitude, cell.longitude] {
                assert!(axis.min <= axis.center && axis.center <= axis.max);
            }
            if let Some(prev) = previous {
                let prev_area = prev.latitude.width() * prev.longitude.width();
                let area = cell.latitude.width() * cell.longitude.width();
                assert!(area < prev_area);
            }
            previous = Some(cell);
        }
    }

    #[test]
    fn test_roundtrip_within_one_cell() {
        for precision in 1..=12 {
            let mut lat = -90.0;
            while lat <= 90.0 {
                let mut lon = -180.0;
                while lon <= 180.0 {
                    let hash = encode(lat, lon, precision).unwrap();
                    let cell = decode(&hash).unwrap();
                    let (c_lat, c_lon) = cell.center();
                    assert!((c_lat - lat).abs() <= cell.latitude.width());
                    assert!((c_lon - lon).abs() <= cell.longitude.width());
                    lon += 37.3;
                }
                lat += 17.9;
            }
        }
    }

    #[test]
    fn test_odd_tables_mirror_even_tables() {
        for direction in Direction::ALL {
            let partner = direction.transposed();
            assert_eq!(partner.transposed(), direction);
            assert_eq!(
                neighbor_table(direction, Parity::Odd),
                neighbor_table(partner, Parity::Even)
            );
            assert_eq!(
                border_table(direction, Parity::Odd),
                border_table(partner, Parity::Even)
            );
        }
        assert_eq!(border_table(Direction::Bottom, Parity::Odd), "0145hjnp");
        assert_eq!(
            neighbor_table(Direction::Right, Parity::Odd),
            "p0r21436x8zb9dcf5h7kjnmqesgutwvy"
        );
    }

    #[test]
    fn test_neighbor_tables_are_permutations_of_alphabet() {
        for parity in [Parity::Even, Parity::Odd] {
            for direction in Direction::ALL {
                let mut symbols: Vec<u8> = neighbor_table(direction, parity).bytes().collect();
                symbols.sort_unstable();
                let mut alphabet = BASE32.to_vec();
                alphabet.sort_unstable();
                assert_eq!(symbols, alphabet);
            }
        }
    }

    #[test]
    fn test_adjacent_known_cells() {
        assert_eq!(adjacent("u33dc", Direction::Right).unwrap(), "u33df");
        assert_eq!(adjacent("u33dc", Direction::Left).unwrap(), "u33db");
        assert_eq!(adjacent("u33dc", Direction::Top).unwrap(), "u33e1");
        assert_eq!(adjacent("u33dc", Direction::Bottom).unwrap(), "u33d9");
    }

    #[test]
    fn test_adjacent_crosses_parent_boundary() {
        assert_eq!(adjacent("u33dz", Direction::Right).unwrap(), "u33fb");
        assert_eq!(adjacent("u33d8", Direction::Left).unwrap(), "u336x");
        let west = decode("u33fb").unwrap();
        let east = decode("u33dz").unwrap();
        assert_eq!(west.longitude.min, east.longitude.max);
    }

    #[test]
    fn test_adjacent_roundtrip() {
        for hash in ["u33dc", "sp3e", "u173z", "ezs42", "9q8yyk", "dr5ru7", "gbsuv"] {
            let left = adjacent(hash, Direction::Left).unwrap();
            assert_eq!(adjacent(&left, Direction::Right).unwrap(), hash);
            let top = adjacent(hash, Direction::Top).unwrap();
            assert_eq!(adjacent(&top, Direction::Bottom).unwrap(), hash);
        }
    }

    #[test]
    fn test_adjacent_is_lowercase_and_validates() {
        assert_eq!(adjacent("U33DC", Direction::Right).unwrap(), "u33df");
        assert_eq!(adjacent("", Direction::Right), Err(GeohashError::Empty));
        assert_eq!(
            adjacent("u3a", Direction::Right),
            Err(GeohashError::InvalidCharacter('a'))
        );
    }

    #[test]
    fn test_adjacent_wraps_at_top_level() {
        let east = adjacent("z", Direction::Right).unwrap();
        assert_eq!(east.len(), 1);
        assert_eq!(adjacent(&east, Direction::Left).unwrap(), "z");
    }

    #[test]
    fn test_neighbors_surround_cell() {
        let cell = decode("u33dc").unwrap();
        let around = neighbors("u33dc").unwrap();
        let north = decode(&around.n).unwrap();
        let east = decode(&around.e).unwrap();
        assert!((north.latitude.min - cell.latitude.max).abs() < 1e-9);
        assert!((east.longitude.min - cell.longitude.max).abs() < 1e-9);
        assert_eq!(around.ne, adjacent(&around.e, Direction::Top).unwrap());
        assert_eq!(around.sw, adjacent(&around.w, Direction::Bottom).unwrap());
    }
}
