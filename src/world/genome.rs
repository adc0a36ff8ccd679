use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Total genes: the 101-slot instruction tape plus 8 fixed parameters.
pub const GENOME_LEN: usize = 109;
/// Gene addresses 0..=100 form the instruction tape.
pub const TAPE_LEN: usize = 101;
/// Highest valid tape address; the instruction pointer wraps after it.
pub const LAST_ADDRESS: u8 = 100;
/// Every gene value lies in 0..=MAX_GENE.
pub const MAX_GENE: u8 = 100;

pub const START_GENE: usize = 101;
pub const LIFESPAN_GENE: usize = 102;
pub const MAX_ENERGY_GENE: usize = 103;
pub const MIN_ENERGY_GENE: usize = 104;
pub const DIVISION_SHARE_GENE: usize = 105;
pub const DIVISION_THRESHOLD_GENE: usize = 106;
pub const MUTATION_RATE_GENE: usize = 107;
/// Reproduction jitter seed; carried and inherited but not interpreted.
pub const BREED_JITTER_GENE: usize = 108;

/// Most positions two genomes may differ in and still count as kin.
pub const KINSHIP_TOLERANCE: usize = 2;

/// Color drift window, per channel, applied on a mutation event.
const COLOR_DRIFT: i32 = 40;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenomeError {
    #[error("genome must have 109 genes, got {0}")]
    WrongLength(usize),
    #[error("gene {position} is {value}, must be 0-100")]
    OutOfRange { position: usize, value: i64 },
}

/// Fixed-length instruction tape plus parameter block. Owned by value so an
/// offspring's mutation never touches its parent's genes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct Genome([u8; GENOME_LEN]);

impl Genome {
    /// Validates an ordered gene sequence.
    pub fn from_genes(genes: &[i64]) -> Result<Self, GenomeError> {
        if genes.len() != GENOME_LEN {
            return Err(GenomeError::WrongLength(genes.len()));
        }
        let mut out = [0u8; GENOME_LEN];
        for (position, (&value, slot)) in genes.iter().zip(out.iter_mut()).enumerate() {
            if !(0..=MAX_GENE as i64).contains(&value) {
                return Err(GenomeError::OutOfRange { position, value });
            }
            *slot = value as u8;
        }
        Ok(Genome(out))
    }

    /// Uniform genes across the whole genome; address 100 is kept below 100.
    pub fn random(rng: &mut impl Rng) -> Self {
        let mut genes = [0u8; GENOME_LEN];
        for gene in genes.iter_mut() {
            *gene = rng.gen_range(0..=MAX_GENE);
        }
        genes[LAST_ADDRESS as usize] = rng.gen_range(0..MAX_GENE);
        Genome(genes)
    }

    /// A genome with every gene set to `value` (clamped to the valid range).
    pub fn filled(value: u8) -> Self {
        Genome([value.min(MAX_GENE); GENOME_LEN])
    }

    pub fn gene(&self, position: usize) -> u8 {
        self.0[position]
    }

    /// Returns a copy with one gene replaced. Positions outside the genome are ignored.
    pub fn with_gene(&self, position: usize, value: u8) -> Self {
        let mut copy = self.clone();
        if position < GENOME_LEN {
            copy.0[position] = value.min(MAX_GENE);
        }
        copy
    }

    pub fn genes(&self) -> &[u8; GENOME_LEN] {
        &self.0
    }

    pub fn tape(&self) -> &[u8] {
        &self.0[..TAPE_LEN]
    }

    pub fn start_address(&self) -> u8 {
        self.0[START_GENE]
    }

    pub fn lifespan_multiplier(&self) -> u8 {
        self.0[LIFESPAN_GENE]
    }

    pub fn max_energy_multiplier(&self) -> u8 {
        self.0[MAX_ENERGY_GENE]
    }

    pub fn min_energy_offset(&self) -> u8 {
        self.0[MIN_ENERGY_GENE]
    }

    /// Percent of post-cost energy handed to the offspring.
    pub fn division_share(&self) -> u8 {
        self.0[DIVISION_SHARE_GENE]
    }

    pub fn division_threshold_offset(&self) -> u8 {
        self.0[DIVISION_THRESHOLD_GENE]
    }

    pub fn mutation_rate(&self) -> u8 {
        self.0[MUTATION_RATE_GENE]
    }

    /// Copies the genome and rewrites one uniformly chosen position with a
    /// uniformly drawn value in 0..=100.
    pub fn mutate(&self, rng: &mut impl Rng) -> Genome {
        let position = rng.gen_range(0..GENOME_LEN);
        let value = rng.gen_range(0..=MAX_GENE);
        self.with_gene(position, value)
    }

    /// Number of differing positions, stopping early once `limit` is exceeded.
    pub fn differences(&self, other: &Genome, limit: usize) -> usize {
        let mut diff = 0;
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            if a != b {
                diff += 1;
                if diff > limit {
                    break;
                }
            }
        }
        diff
    }

    /// Kin recognition: at most two differing genes.
    pub fn is_kin(&self, other: &Genome) -> bool {
        self.differences(other, KINSHIP_TOLERANCE) <= KINSHIP_TOLERANCE
    }
}

impl TryFrom<Vec<u8>> for Genome {
    type Error = GenomeError;

    fn try_from(genes: Vec<u8>) -> Result<Self, Self::Error> {
        let widened: Vec<i64> = genes.into_iter().map(i64::from).collect();
        Genome::from_genes(&widened)
    }
}

impl From<Genome> for Vec<u8> {
    fn from(genome: Genome) -> Vec<u8> {
        genome.0.to_vec()
    }
}

/// 24-bit display color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const ROCK: Color = Color::rgb(0xff, 0x00, 0x00);
    pub const ENERGY: Color = Color::rgb(0xff, 0xff, 0xff);
    pub const GEYSER: Color = Color::rgb(0x00, 0xbf, 0xff);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Bright random color, each channel in 80..=255.
    pub fn random(rng: &mut impl Rng) -> Self {
        Color::rgb(
            rng.gen_range(80..=255),
            rng.gen_range(80..=255),
            rng.gen_range(80..=255),
        )
    }

    /// Nudges one random channel by up to ±40, clamped to 0..=255.
    pub fn drift(self, rng: &mut impl Rng) -> Color {
        let mut channels = [self.r, self.g, self.b];
        let channel = rng.gen_range(0..3);
        let current = channels[channel] as i32;
        let value = rng.gen_range(current - COLOR_DRIFT..=current + COLOR_DRIFT);
        channels[channel] = value.clamp(0, 255) as u8;
        Color::rgb(channels[0], channels[1], channels[2])
    }
}
