use std::io;

use quick_xml::events::BytesStart;
use quick_xml::Error as XMLError;
use thiserror::Error;

use crate::params::{curie_to_num, ControlledVocabulary, Param, Unit};

/// The sections of an mzML document the parser distinguishes between
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum MzMLParserState {
    #[default]
    Start = 0,

    FileDescription,
    FileContents,
    SourceFileList,
    SourceFile,

    Run,
    SpectrumList,

    Spectrum,
    SpectrumDone,

    ScanList,
    Scan,
    ScanWindowList,

    PrecursorList,
    Precursor,
    IsolationWindow,
    SelectedIonList,
    SelectedIon,
    Activation,

    BinaryDataArrayList,
    BinaryDataArray,
    Binary,

    ParserError,
}

/**
All the ways that mzML parsing can go wrong
*/
#[derive(Debug, Error)]
pub enum MzMLParserError {
    #[error("An error occurred outside of normal conditions {0:?}")]
    UnknownError(MzMLParserState),
    #[error("An incomplete spectrum was parsed")]
    IncompleteSpectrum,
    #[error("An incomplete element {0} was encountered in {1:?}")]
    IncompleteElementError(String, MzMLParserState),
    #[error("An XML error {1:?} was encountered in {0:?}")]
    XMLError(MzMLParserState, #[source] XMLError),
    #[error("An IO error {1} was encountered in {0:?}")]
    IOError(MzMLParserState, #[source] io::Error),
}

impl From<MzMLParserError> for io::Error {
    fn from(value: MzMLParserError) -> Self {
        match value {
            MzMLParserError::IOError(_, ref e) => io::Error::new(e.kind(), value),
            _ => io::Error::new(io::ErrorKind::InvalidData, value),
        }
    }
}

pub type ParserResult = Result<MzMLParserState, MzMLParserError>;

/// Read the unescaped value of the attribute `key` from a start tag
pub(crate) fn attribute_value(event: &BytesStart, key: &[u8]) -> Result<Option<String>, XMLError> {
    for attr in event.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.to_string()));
        }
    }
    Ok(None)
}

/// Convert a `cvParam` or `userParam` tag into a [`Param`]
pub(crate) fn handle_param(event: &BytesStart, state: MzMLParserState) -> Result<Param, MzMLParserError> {
    let mut param = Param::new();
    let mut name = None;
    for attr_parsed in event.attributes() {
        let attr = attr_parsed.map_err(|e| MzMLParserError::XMLError(state, e.into()))?;
        let value = attr
            .unescape_value()
            .map_err(|e| MzMLParserError::XMLError(state, e))?;
        match attr.key.as_ref() {
            b"name" => name = Some(value.to_string()),
            b"value" => param.value = value.to_string(),
            b"cvRef" => {
                param.controlled_vocabulary = value
                    .parse::<ControlledVocabulary>()
                    .ok()
                    .and_then(|cv| cv.as_option());
            }
            b"accession" => {
                let (_, acc) = curie_to_num(&value);
                param.accession = acc;
            }
            b"unitAccession" => param.unit = Unit::from_accession(&value),
            _ => {}
        }
    }
    param.name = name.ok_or_else(|| {
        MzMLParserError::IncompleteElementError(
            String::from_utf8_lossy(event.name().as_ref()).to_string(),
            state,
        )
    })?;
    Ok(param)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_handle_param() -> Result<(), MzMLParserError> {
        let tag = BytesStart::from_content(
            r#"cvParam cvRef="MS" accession="MS:1000016" name="scan start time" value="12.5" unitCvRef="UO" unitAccession="UO:0000010" unitName="second""#,
            7,
        );
        let param = handle_param(&tag, MzMLParserState::Scan)?;
        assert_eq!(param.accession, Some(1000016));
        assert_eq!(param.controlled_vocabulary, Some(ControlledVocabulary::MS));
        assert_eq!(param.unit, Unit::Second);
        assert_eq!(param.coerce::<f64>().unwrap(), 12.5);

        let tag = BytesStart::from_content(r#"userParam value="x""#, 9);
        assert!(matches!(
            handle_param(&tag, MzMLParserState::Spectrum),
            Err(MzMLParserError::IncompleteElementError(_, MzMLParserState::Spectrum))
        ));
        Ok(())
    }
}
