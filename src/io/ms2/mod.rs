//! Read and write the MS2 text format, one `S` block per spectrum.
mod reader;
mod writer;

pub use reader::{is_ms2, MS2Error, MS2Reader};
pub use writer::MS2Writer;

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::SpectrumSource;
    use crate::utils::mass_charge_ratio;
    use std::io;

    const SMALL_MS2: &str = "H\tCreationDate\ttoday\n\
H\tExtractor\tsomething\n\
S\t000012\t000012\t500.5\n\
I\tRTime\t1.25\n\
Z\t2\t1000.0\n\
Z\t3\t1499.0\n\
100.0 5.0\n\
200.5 7.5\n\
S\t000013\t000013\t612.25\n\
I\tNativeID\tcontrollerType=0 controllerNumber=1 scan=13\n\
I\tTitle\trun.13.13.\n\
150.0 1.0\n";

    #[test_log::test]
    fn test_reader() -> io::Result<()> {
        let mut reader = MS2Reader::new_indexed(io::Cursor::new(SMALL_MS2.as_bytes()))?;
        assert_eq!(reader.len(), 2);

        let first = reader.get_spectrum_by_id("scan=000012").unwrap();
        assert_eq!(first.scan_number(), 12);
        assert_eq!(first.peaks().len(), 2);
        assert!((first.start_time() - 1.25).abs() < 1e-9);
        let mccs = first.mass_charge_candidates();
        assert_eq!(mccs.len(), 2);
        assert!((mccs[0].precursor_mz - mass_charge_ratio(1000.0 - crate::utils::PROTON, 2)).abs() < 1e-9);
        assert!((mccs[1].mass - (1499.0 - crate::utils::PROTON)).abs() < 1e-9);

        let second = reader.get_spectrum_by_scan_number(13).unwrap();
        assert_eq!(second.id(), "controllerType=0 controllerNumber=1 scan=13");
        assert_eq!(second.description.title(), Some("run.13.13."));
        assert_eq!(second.mass_charge_candidates().len(), 2);
        assert_eq!(second.peaks().len(), 1);

        let all: Vec<_> = reader.collect();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].index(), 1);
        Ok(())
    }

    #[test]
    fn test_detection() {
        assert!(is_ms2(SMALL_MS2.as_bytes()));
        assert!(!is_ms2(b"BEGIN IONS\n"));
    }
}
