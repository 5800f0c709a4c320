//! Read and write indexed mzXML documents.
mod reader;
mod writer;

pub use reader::{is_mzxml, MzXMLError, MzXMLReader};
pub use writer::{MzXMLWriter, MzXMLWriterState};

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::binary::BinaryCompressionType;
    use crate::io::{SpectrumSource, SpectrumWriter};
    use crate::meta::MSDataFileMetadata;
    use crate::spectrum::{MassChargeCandidate, Spectrum, SpectrumDescription};
    use std::io;

    use super::reader::parse_retention_time;

    const NESTED: &str = r#"<?xml version="1.0" encoding="ISO-8859-1"?>
<mzXML xmlns="http://sashimi.sourceforge.net/schema_revision/mzXML_3.2">
  <msRun scanCount="2">
    <parentFile fileName="file:///data/run1.RAW" fileType="RAWData" fileSha1="abc"/>
    <scan num="10" msLevel="1" peaksCount="0" retentionTime="PT60S">
      <peaks precision="32" byteOrder="network" pairOrder="m/z-int"/>
      <scan num="11" msLevel="2" peaksCount="1" retentionTime="PT61.5S">
        <precursorMz precursorIntensity="120" possibleCharges="2,3">512.3</precursorMz>
        <peaks precision="32" byteOrder="network" pairOrder="m/z-int">Q8gAAEEgAAA=</peaks>
      </scan>
    </scan>
  </msRun>
</mzXML>
"#;

    #[test_log::test]
    fn test_nested_scans() -> io::Result<()> {
        let mut reader = MzXMLReader::new_indexed(io::Cursor::new(NESTED.as_bytes()))?;
        assert_eq!(reader.len(), 2);
        assert_eq!(reader.source_file_name(), Some("run1.RAW"));

        let ids: Vec<String> = reader.by_ref().map(|s| s.id().to_string()).collect();
        assert_eq!(ids, vec!["scan=10", "scan=11"]);

        let ms1 = reader.get_spectrum_by_scan_number(10).unwrap();
        assert_eq!(ms1.ms_level(), 1);
        assert!(ms1.peaks().is_empty());
        assert!(ms1.precursor().is_none());

        let ms2 = reader.get_spectrum_by_id("scan=11").unwrap();
        assert_eq!(ms2.ms_level(), 2);
        assert!((ms2.start_time() - 1.025).abs() < 1e-9);
        assert_eq!(ms2.mz_intensity_pairs(), vec![(400.0, 10.0)]);
        let charges: Vec<i32> = ms2.mass_charge_candidates().iter().map(|c| c.charge).collect();
        assert_eq!(charges, vec![2, 3]);
        assert_eq!(ms2.precursor().unwrap().ion().unwrap().intensity, 120.0);
        Ok(())
    }

    #[test]
    fn test_retention_time() {
        assert_eq!(parse_retention_time("PT30S"), Some(0.5));
        assert_eq!(parse_retention_time("PT2.5M"), Some(2.5));
        assert_eq!(parse_retention_time("30"), None);
    }

    #[test_log::test]
    fn test_zlib_round_trip() -> io::Result<()> {
        let mut spec = Spectrum::new(SpectrumDescription::default(), Vec::new());
        spec.set_id("merged=7");
        spec.description.index = 6;
        spec.description.set_title("consensus 7");
        spec.set_mz_intensity_pairs(vec![(101.5, 3.0), (202.25, 9.5)]);
        spec.set_mass_charge_candidates(&[MassChargeCandidate::from_precursor_mz(610.8, 2)]);

        let mut buffer = Vec::new();
        {
            let mut writer = MzXMLWriter::new(&mut buffer);
            writer.data_array_compression = BinaryCompressionType::Zlib;
            writer.set_spectrum_count(1);
            writer.write(&spec)?;
            SpectrumWriter::close(&mut writer)?;
        }
        let text = String::from_utf8(buffer.clone()).unwrap();
        assert!(text.contains(r#"compressionType="zlib""#));
        let start = text.find("<indexOffset>").unwrap() + "<indexOffset>".len();
        let end = text.find("</indexOffset>").unwrap();
        let offset: usize = text[start..end].parse().unwrap();
        assert!(text[offset..].starts_with("<index name=\"scan\">"));

        let mut reader = MzXMLReader::new_indexed(io::Cursor::new(buffer))?;
        let found = reader.get_spectrum_by_id("merged=7").unwrap();
        assert_eq!(found.scan_number(), 7);
        assert_eq!(found.description.title(), Some("consensus 7"));
        assert_eq!(found.mz_intensity_pairs(), spec.mz_intensity_pairs());
        assert_eq!(reader.get_spectrum_by_scan_number(7).unwrap().id(), "merged=7");
        Ok(())
    }

    #[test_log::test]
    fn test_scan_num_does_not_repeat() -> io::Result<()> {
        let spectra: Vec<Spectrum> = ["scan=4294967297", "scan=8589934593", "scan=2"]
            .into_iter()
            .map(|id| {
                let mut spec = Spectrum::new(SpectrumDescription::default(), Vec::new());
                spec.set_id(id);
                spec.set_mz_intensity_pairs(vec![(150.0, 1.0)]);
                spec
            })
            .collect();

        let mut buffer = Vec::new();
        {
            let mut writer = MzXMLWriter::new(&mut buffer);
            writer.write_all(spectra.iter())?;
            let nums: Vec<&str> = writer.offset_index.keys().map(|k| &**k).collect();
            assert_eq!(nums, vec!["1", "2", "3"]);
            SpectrumWriter::close(&mut writer)?;
        }
        let text = String::from_utf8(buffer.clone()).unwrap();
        assert_eq!(text.matches("<offset id=").count(), 3);

        let mut reader = MzXMLReader::new_indexed(io::Cursor::new(buffer))?;
        assert_eq!(reader.len(), 3);
        for spec in spectra.iter() {
            assert_eq!(reader.get_spectrum_by_id(spec.id()).unwrap().id(), spec.id());
        }
        Ok(())
    }

    #[test]
    fn test_detection() {
        assert!(is_mzxml(NESTED.as_bytes()));
        assert!(!is_mzxml(b"<mzML>"));
    }
}
