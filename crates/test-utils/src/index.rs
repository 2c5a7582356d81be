//! wgrib2-style `.idx` inventories for concatenated test messages.

/// A GRIB file and its inventory.
#[derive(Debug, Clone)]
pub struct GribFixture {
    pub grib: Vec<u8>,
    pub index: String,
}

impl GribFixture {
    /// Byte range `(start, length)` of the n-th (0-based) record.
    pub fn range_of(&self, n: usize) -> (u64, u64) {
        let offsets: Vec<u64> = self
            .index
            .lines()
            .filter_map(|line| line.split(':').nth(1)?.parse().ok())
            .collect();
        let start = offsets[n];
        let end = offsets
            .get(n + 1)
            .copied()
            .unwrap_or(self.grib.len() as u64);
        (start, end - start)
    }
}

/// Concatenates messages and writes one inventory line per message:
/// `{n}:{offset}:d={date}:{short}:{level}:{forecast}:`
#[derive(Debug, Default)]
pub struct IndexBuilder {
    date: String,
    entries: Vec<(String, String, String, Vec<u8>)>,
}

impl IndexBuilder {
    /// `date` as in wgrib2 output, e.g. "2024011512"
    pub fn new(date: &str) -> Self {
        Self {
            date: date.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn add(mut self, short_name: &str, level: &str, forecast: &str, message: Vec<u8>) -> Self {
        self.entries.push((
            short_name.to_string(),
            level.to_string(),
            forecast.to_string(),
            message,
        ));
        self
    }

    pub fn build(self) -> GribFixture {
        let mut grib = Vec::new();
        let mut index = String::new();
        for (n, (short_name, level, forecast, message)) in self.entries.into_iter().enumerate() {
            index.push_str(&format!(
                "{}:{}:d={}:{}:{}:{}:\n",
                n + 1,
                grib.len(),
                self.date,
                short_name,
                level,
                forecast
            ));
            grib.extend_from_slice(&message);
        }
        GribFixture { grib, index }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_offsets() {
        let fixture = IndexBuilder::new("2024011512")
            .add("TMP", "2 m above ground", "anl", vec![0; 10])
            .add("UGRD", "10 m above ground", "anl", vec![0; 7])
            .build();

        let lines: Vec<&str> = fixture.index.lines().collect();
        assert_eq!(lines[0], "1:0:d=2024011512:TMP:2 m above ground:anl:");
        assert_eq!(lines[1], "2:10:d=2024011512:UGRD:10 m above ground:anl:");
        assert_eq!(fixture.range_of(1), (10, 7));
    }
}
