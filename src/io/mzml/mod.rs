//! Read and write indexed mzML documents.
//!
//! Only the parts of mzML that describe centroided MSn spectra are understood: the
//! file description, each spectrum's scan list, precursor and its m/z and intensity
//! arrays. Chromatograms and instrument metadata are skipped when reading.
mod reader;
mod reading_shared;
mod writer;

pub use reader::{is_mzml, MzMLReader};
pub use reading_shared::{MzMLParserError, MzMLParserState};
pub use writer::{MzMLWriter, MzMLWriterError, MzMLWriterState, WriterResult};

pub(crate) use reading_shared::attribute_value;
pub(crate) use writer::InnerXMLWriter;

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::{MassSpectrometryFormat, SpectrumSource, SpectrumWriter};
    use crate::meta::{MSDataFileMetadata, SourceFile};
    use crate::params::ParamDescribed;
    use crate::spectrum::{MassChargeCandidate, Spectrum, SpectrumDescription};
    use std::io;
    use std::path::Path;

    const HANDWRITTEN: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<mzML xmlns="http://psi.hupo.org/ms/mzml" version="1.1.0">
  <fileDescription>
    <fileContents>
      <cvParam cvRef="MS" accession="MS:1000580" name="MSn spectrum"/>
    </fileContents>
    <sourceFileList count="1">
      <sourceFile id="RAW1" name="run.raw" location="file:///data">
        <cvParam cvRef="MS" accession="MS:1000768" name="Thermo nativeID format"/>
        <cvParam cvRef="MS" accession="MS:1000563" name="Thermo RAW format"/>
      </sourceFile>
    </sourceFileList>
  </fileDescription>
  <run id="r">
    <spectrumList count="1">
      <spectrum index="0" id="controllerType=0 controllerNumber=1 scan=44" defaultArrayLength="2">
        <cvParam cvRef="MS" accession="MS:1000511" name="ms level" value="2"/>
        <userParam name="source" value="handwritten"/>
        <scanList count="1">
          <scan>
            <cvParam cvRef="MS" accession="MS:1000016" name="scan start time" value="90" unitCvRef="UO" unitAccession="UO:0000010" unitName="second"/>
            <scanWindowList count="1">
              <scanWindow>
                <cvParam cvRef="MS" accession="MS:1000501" name="scan window lower limit" value="100"/>
              </scanWindow>
            </scanWindowList>
          </scan>
        </scanList>
        <precursorList count="1">
          <precursor>
            <selectedIonList count="1">
              <selectedIon>
                <cvParam cvRef="MS" accession="MS:1000744" name="selected ion m/z" value="445.34"/>
                <cvParam cvRef="MS" accession="MS:1000633" name="possible charge state" value="2"/>
                <cvParam cvRef="MS" accession="MS:1000633" name="possible charge state" value="3"/>
              </selectedIon>
            </selectedIonList>
          </precursor>
        </precursorList>
        <binaryDataArrayList count="2">
          <binaryDataArray encodedLength="24">
            <cvParam cvRef="MS" accession="MS:1000523" name="64-bit float"/>
            <cvParam cvRef="MS" accession="MS:1000576" name="no compression"/>
            <cvParam cvRef="MS" accession="MS:1000514" name="m/z array"/>
            <binary>AAAAAAAAWUAAAAAAAMByQA==</binary>
          </binaryDataArray>
          <binaryDataArray encodedLength="12">
            <cvParam cvRef="MS" accession="MS:1000521" name="32-bit float"/>
            <cvParam cvRef="MS" accession="MS:1000576" name="no compression"/>
            <cvParam cvRef="MS" accession="MS:1000515" name="intensity array"/>
            <binary>AAAgQQAAoEA=</binary>
          </binaryDataArray>
        </binaryDataArrayList>
      </spectrum>
    </spectrumList>
  </run>
</mzML>
"#;

    #[test_log::test]
    fn test_read_handwritten() -> io::Result<()> {
        let mut reader = MzMLReader::new_indexed(io::Cursor::new(HANDWRITTEN.as_bytes()))?;
        assert_eq!(reader.len(), 1);
        assert_eq!(reader.source_file_name(), Some("run.raw"));
        let sf = &reader.file_description().source_files[0];
        assert_eq!(sf.id_format.as_ref().unwrap().accession, Some(1000768));
        assert_eq!(sf.file_format.as_ref().unwrap().accession, Some(1000563));

        let spec = reader.get_spectrum_by_scan_number(44).unwrap();
        assert_eq!(spec.ms_level(), 2);
        assert!((spec.start_time() - 1.5).abs() < 1e-9);
        assert_eq!(spec.description.get_param_by_name("source").unwrap().value, "handwritten");
        assert!(spec.description.acquisition.scans[0].params.is_empty());

        let charges: Vec<_> = spec.mass_charge_candidates().iter().map(|c| c.charge).collect();
        assert_eq!(charges, vec![2, 3]);

        assert_eq!(spec.mz_intensity_pairs(), vec![(100.0, 10.0), (300.0, 5.0)]);
        Ok(())
    }

    fn sample_spectrum(i: usize) -> Spectrum {
        let mut spec = Spectrum::new(SpectrumDescription::default(), Vec::new());
        spec.set_id(format!("scan={}", i + 1));
        spec.description.set_title(format!("cluster {i}"));
        spec.set_mz_intensity_pairs((0..5).map(|j| (150.0 + j as f64 * 10.5, j as f32 + 1.0)));
        spec.set_mass_charge_candidates(&[
            MassChargeCandidate::from_precursor_mz(500.25, 2),
            MassChargeCandidate::from_precursor_mz(333.83, 3),
        ]);
        spec
    }

    #[test_log::test]
    fn test_writer_index_and_checksum() -> io::Result<()> {
        let mut buffer = Vec::new();
        let offsets: Vec<(String, usize)> = {
            let mut writer = MzMLWriter::new(&mut buffer);
            writer.file_description_mut().add_source_file(SourceFile::from_path(
                Path::new("/tmp/input.mgf"),
                MassSpectrometryFormat::MGF,
            ));
            writer.set_spectrum_count(3);
            for i in 0..3 {
                writer.write(&sample_spectrum(i))?;
            }
            SpectrumWriter::close(&mut writer)?;
            let offsets = writer
                .offset_index
                .iter()
                .map(|(id, offset)| (id.to_string(), *offset as usize))
                .collect();
            offsets
        };
        assert_eq!(offsets.len(), 3);
        for (id, offset) in offsets {
            let expected = format!("<spectrum id=\"{id}\"");
            assert_eq!(&buffer[offset..offset + expected.len()], expected.as_bytes());
        }
        let text = String::from_utf8(buffer.clone()).unwrap();
        assert!(text.contains(r#"<spectrumList count="3""#));

        let tag = "<fileChecksum>";
        let start = text.find(tag).unwrap() + tag.len();
        let end = text.find("</fileChecksum>").unwrap();
        let expected = format!("{:x}", md5::compute(&buffer[..start]));
        assert_eq!(&text[start..end], expected);

        let offset_start = text.find("<indexListOffset>").unwrap() + "<indexListOffset>".len();
        let offset_end = text.find("</indexListOffset>").unwrap();
        let offset: usize = text[offset_start..offset_end].parse().unwrap();
        assert!(text[offset..].starts_with("<indexList "));

        let mut reader = MzMLReader::new_indexed(io::Cursor::new(buffer))?;
        assert_eq!(reader.source_file_name(), Some("input.mgf"));
        let spec = reader.get_spectrum_by_id("scan=2").unwrap();
        assert_eq!(spec.description.title(), Some("cluster 1"));
        assert_eq!(spec.mass_charge_candidates().len(), 2);
        assert_eq!(spec.peaks().len(), 5);
        Ok(())
    }

    #[test]
    fn test_detection() {
        assert!(is_mzml(HANDWRITTEN.as_bytes()));
        assert!(!is_mzml(b"BEGIN IONS\n"));
    }
}
