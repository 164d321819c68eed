//! Position output writers.
//!
//! The integrator reports trajectory samples through [`PositionWriter`].
//! CSV rows are `timestamp,latitude,longitude,altitude`; the KML writer
//! produces a self-contained document with one absolute-altitude line
//! string, so the last CSV row (or KML coordinate) is the predicted
//! landing.

use std::io::{self, Write};

/// Sink for trajectory position samples.
pub trait PositionWriter {
    /// Record one position sample.
    ///
    /// # Errors
    /// Returns any underlying I/O error; a failed write aborts the run.
    fn write_position(
        &mut self,
        latitude: f64,
        longitude: f64,
        altitude: f64,
        timestamp: i64,
    ) -> io::Result<()>;

    /// Complete any structured output and flush.
    ///
    /// # Errors
    /// Returns any underlying I/O error.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<W: PositionWriter + ?Sized> PositionWriter for Box<W> {
    fn write_position(
        &mut self,
        latitude: f64,
        longitude: f64,
        altitude: f64,
        timestamp: i64,
    ) -> io::Result<()> {
        (**self).write_position(latitude, longitude, altitude, timestamp)
    }

    fn finish(&mut self) -> io::Result<()> {
        (**self).finish()
    }
}

/// Plain CSV trajectory output, one `timestamp,lat,lng,alt` row per sample.
#[derive(Debug)]
pub struct CsvWriter<W> {
    out: W,
}

impl<W: Write> CsvWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Recover the underlying sink.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> PositionWriter for CsvWriter<W> {
    fn write_position(
        &mut self,
        latitude: f64,
        longitude: f64,
        altitude: f64,
        timestamp: i64,
    ) -> io::Result<()> {
        writeln!(self.out, "{timestamp},{latitude},{longitude},{altitude}")
    }

    fn finish(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

const KML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<kml xmlns=\"http://www.opengis.net/kml/2.2\">\n\
<Document>\n\
<name>Balloon trajectory</name>\n\
<Placemark>\n\
<name>Flight path</name>\n\
<LineString>\n\
<altitudeMode>absolute</altitudeMode>\n\
<coordinates>\n";

const KML_FOOTER: &str = "</coordinates>\n\
</LineString>\n\
</Placemark>\n\
</Document>\n\
</kml>\n";

/// KML trajectory output.
///
/// Coordinates follow the KML convention of `longitude,latitude,altitude`.
/// The document frame is written up front and closed by [`PositionWriter::finish`].
#[derive(Debug)]
pub struct KmlWriter<W> {
    out: W,
    finished: bool,
}

impl<W: Write> KmlWriter<W> {
    /// Write the document preamble and return the writer.
    ///
    /// # Errors
    /// Returns any underlying I/O error.
    pub fn new(mut out: W) -> io::Result<Self> {
        out.write_all(KML_HEADER.as_bytes())?;
        Ok(Self { out, finished: false })
    }

    /// Recover the underlying sink.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> PositionWriter for KmlWriter<W> {
    fn write_position(
        &mut self,
        latitude: f64,
        longitude: f64,
        altitude: f64,
        _timestamp: i64,
    ) -> io::Result<()> {
        writeln!(self.out, "{longitude},{latitude},{altitude}")
    }

    fn finish(&mut self) -> io::Result<()> {
        if !self.finished {
            self.out.write_all(KML_FOOTER.as_bytes())?;
            self.finished = true;
        }
        self.out.flush()
    }
}

/// Fans every sample out to two writers, for CSV and KML side by side.
#[derive(Debug)]
pub struct TeeWriter<A, B> {
    first: A,
    second: B,
}

impl<A, B> TeeWriter<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }

    /// Recover both underlying writers.
    pub fn into_inner(self) -> (A, B) {
        (self.first, self.second)
    }
}

impl<A: PositionWriter, B: PositionWriter> PositionWriter for TeeWriter<A, B> {
    fn write_position(
        &mut self,
        latitude: f64,
        longitude: f64,
        altitude: f64,
        timestamp: i64,
    ) -> io::Result<()> {
        self.first.write_position(latitude, longitude, altitude, timestamp)?;
        self.second.write_position(latitude, longitude, altitude, timestamp)
    }

    fn finish(&mut self) -> io::Result<()> {
        self.first.finish()?;
        self.second.finish()
    }
}

/// One sample captured by [`MemoryWriter`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub timestamp: i64,
}

/// Keeps samples in memory for inspection.
#[derive(Debug, Default)]
pub struct MemoryWriter {
    samples: Vec<PositionSample>,
    finished: bool,
}

impl MemoryWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples recorded so far, in write order.
    #[must_use]
    pub fn samples(&self) -> &[PositionSample] {
        &self.samples
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl PositionWriter for MemoryWriter {
    fn write_position(
        &mut self,
        latitude: f64,
        longitude: f64,
        altitude: f64,
        timestamp: i64,
    ) -> io::Result<()> {
        self.samples.push(PositionSample { latitude, longitude, altitude, timestamp });
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_rows_are_timestamp_first() {
        let mut writer = CsvWriter::new(Vec::new());
        writer.write_position(52.2135, 0.0964, 1_000.0, 1_234_567_890).unwrap();
        writer.write_position(52.25, 0.11, 0.0, 1_234_567_940).unwrap();
        writer.finish().unwrap();

        let text = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "1234567890,52.2135,0.0964,1000");
        assert!(lines[1].starts_with("1234567940,52.25,0.11,"));
    }

    #[test]
    fn test_kml_is_self_contained() {
        let mut writer = KmlWriter::new(Vec::new()).unwrap();
        writer.write_position(52.0, 0.5, 100.0, 0).unwrap();
        writer.finish().unwrap();

        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert!(text.starts_with("<?xml"));
        assert!(text.contains("<coordinates>"));
        // KML coordinate order is longitude first
        assert!(text.contains("\n0.5,52,100\n"));
        assert!(text.ends_with("</kml>\n"));
    }

    #[test]
    fn test_kml_finish_is_idempotent() {
        let mut writer = KmlWriter::new(Vec::new()).unwrap();
        writer.write_position(52.0, 0.5, 100.0, 0).unwrap();
        writer.finish().unwrap();
        writer.finish().unwrap();

        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(text.matches("</kml>").count(), 1);
    }

    #[test]
    fn test_tee_duplicates_samples() {
        let mut writer = TeeWriter::new(MemoryWriter::new(), CsvWriter::new(Vec::new()));
        writer.write_position(1.0, 2.0, 3.0, 4).unwrap();
        writer.finish().unwrap();

        let (memory, csv) = writer.into_inner();
        assert_eq!(memory.samples().len(), 1);
        assert!(memory.is_finished());
        assert_eq!(String::from_utf8(csv.into_inner()).unwrap(), "4,1,2,3\n");
    }

    #[test]
    fn test_memory_writer_preserves_order() {
        let mut writer = MemoryWriter::new();
        writer.write_position(1.0, 0.0, 10.0, 100).unwrap();
        writer.write_position(2.0, 0.0, 20.0, 200).unwrap();

        let samples = writer.samples();
        assert_eq!(samples[0].timestamp, 100);
        assert_eq!(samples[1].latitude, 2.0);
        assert!(!writer.is_finished());
    }
}
