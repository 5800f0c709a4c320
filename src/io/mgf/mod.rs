//! Read and write [MGF](https://www.matrixscience.com/help/data_file_help.html#GEN) files.
//! Supports random access when reading from a source that supports [`io::Seek`](std::io::Seek).
mod reader;
mod writer;

pub use reader::{is_mgf, MGFError, MGFParserState, MGFReader};
pub use writer::MGFWriter;

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::{SpectrumSource, SpectrumWriter};
    use crate::meta::MSDataFileMetadata;
    use crate::spectrum::{MassChargeCandidate, Spectrum, SpectrumDescription};
    use std::io;

    const SMALL_MGF: &str = "\
COM=test file
BEGIN IONS
TITLE=run.10.10.2
RTINSECONDS=120
PEPMASS=500.25 1000
CHARGE=2+
SCANS=10
100.5 10
200.25 20.5
END IONS

BEGIN IONS
TITLE=run.11.11.0
PEPMASS=600.5
CHARGE=2+ and 3+
150 5
END IONS
BEGIN IONS
NATIVEID=scan=4294967307
TITLE=other
PEPMASS=700.1
300 1
END IONS
";

    fn reader() -> io::Result<MGFReader<io::Cursor<&'static [u8]>>> {
        MGFReader::new_indexed(io::Cursor::new(SMALL_MGF.as_bytes()))
    }

    #[test_log::test]
    fn test_reader() -> io::Result<()> {
        let reader = reader()?;
        let spectra: Vec<Spectrum> = reader.collect();
        assert_eq!(spectra.len(), 3);

        let first = &spectra[0];
        assert_eq!(first.id(), "run.10.10.2");
        assert_eq!(first.description.title(), Some("run.10.10.2"));
        assert_eq!(first.scan_number(), 10);
        assert!((first.start_time() - 2.0).abs() < 1e-9);
        assert_eq!(first.peaks().len(), 2);
        let ion = first.precursor().and_then(|p| p.ion()).unwrap();
        assert_eq!(ion.mz, 500.25);
        assert_eq!(ion.intensity, 1000.0);
        assert_eq!(ion.charge, Some(2));

        let second = &spectra[1];
        assert_eq!(second.index(), 1);
        assert_eq!(second.precursor().unwrap().ions.len(), 2);
        assert_eq!(second.mass_charge_candidates().len(), 2);

        assert_eq!(spectra[2].id(), "scan=4294967307");
        assert_eq!(spectra[2].precursor().unwrap().ion().unwrap().charge, None);
        Ok(())
    }

    #[test_log::test]
    fn test_random_access() -> io::Result<()> {
        let mut reader = reader()?;
        assert_eq!(reader.len(), 3);
        let spec = reader.get_spectrum_by_index(2).unwrap();
        assert_eq!(spec.id(), "scan=4294967307");
        assert_eq!(spec.index(), 2);

        let spec = reader.get_spectrum_by_id("run.11.11.0").unwrap();
        assert_eq!(spec.index(), 1);

        let spec = reader.get_spectrum_by_scan_number(10).unwrap();
        assert_eq!(spec.id(), "run.10.10.2");
        assert!(reader.get_spectrum_by_scan_number(99).is_none());

        // Random access leaves iteration where it was
        let first = reader.next().unwrap();
        assert_eq!(first.index(), 0);
        reader.reset();
        assert_eq!(reader.count(), 3);
        Ok(())
    }

    #[test_log::test]
    fn test_malformed_peak_line() -> io::Result<()> {
        let text = "BEGIN IONS\nTITLE=a\n100.0 ten\nEND IONS\n";
        let mut reader = MGFReader::new_indexed(io::Cursor::new(text.as_bytes()))?;
        assert!(reader.next().is_none());
        Ok(())
    }

    #[test_log::test]
    fn test_writer_round_trip() -> io::Result<()> {
        let mut spec = Spectrum::new(SpectrumDescription::default(), Vec::new());
        spec.set_id("scan=3");
        spec.set_mz_intensity_pairs(vec![(120.0, 3.0), (110.0, 1.5)]);
        spec.set_mass_charge_candidates(&[
            MassChargeCandidate::from_precursor_mz(450.75, 2),
            MassChargeCandidate::from_precursor_mz(450.75, 3),
        ]);

        let mut buffer = Vec::new();
        {
            let mut writer = MGFWriter::new(&mut buffer);
            assert_eq!(writer.file_description().contents.len(), 1);
            writer.write(&spec)?;
            writer.close()?;
        }
        let text = String::from_utf8_lossy(&buffer).to_string();
        assert!(text.contains("TITLE=scan=3\n"));
        assert!(text.contains("CHARGE=2+ and 3+\n"));

        let mut reader = MGFReader::new_indexed(io::Cursor::new(buffer))?;
        let read_back = reader.get_spectrum_by_id("scan=3").unwrap();
        assert_eq!(read_back.mz_intensity_pairs(), spec.mz_intensity_pairs());
        let charges: Vec<i32> = read_back
            .mass_charge_candidates()
            .iter()
            .map(|c| c.charge)
            .collect();
        assert_eq!(charges, vec![2, 3]);
        Ok(())
    }
}
