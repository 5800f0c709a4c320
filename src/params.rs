use std::borrow::Cow;
use std::convert::Infallible;
use std::str::{self, FromStr};

pub fn curie_to_num(curie: &str) -> (Option<ControlledVocabulary>, Option<u32>) {
    let mut parts = curie.split(':');
    let prefix = match parts.next() {
        Some(v) => v.parse::<ControlledVocabulary>().ok().and_then(|cv| cv.as_option()),
        None => None,
    };
    match parts.next().map(|k| k.parse::<u32>()) {
        Some(Ok(v)) => (prefix, Some(v)),
        _ => (prefix, None),
    }
}

/// A controlled vocabulary term or a user-defined `key=value` annotation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub value: String,
    pub accession: Option<u32>,
    pub controlled_vocabulary: Option<ControlledVocabulary>,
    pub unit: Unit,
}

impl Param {
    pub fn new() -> Param {
        Param {
            ..Default::default()
        }
    }

    pub fn new_key_value<K: Into<String>, V: Into<String>>(name: K, value: V) -> Param {
        let mut inst = Self::new();
        inst.name = name.into();
        inst.value = value.into();
        inst
    }

    pub fn coerce<T: str::FromStr>(&self) -> Result<T, T::Err> {
        self.value.parse::<T>()
    }

    pub fn is_controlled(&self) -> bool {
        self.accession.is_some()
    }

    pub fn curie(&self) -> Option<String> {
        match (self.controlled_vocabulary, self.accession) {
            (Some(cv), Some(acc)) => Some(format!("{}:{:07}", cv.prefix(), acc)),
            _ => None,
        }
    }

    pub fn with_unit_t(mut self, unit: &Unit) -> Param {
        self.unit = *unit;
        self
    }
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum ControlledVocabulary {
    MS,
    UO,
    Unknown,
}

const MS_CV: &str = "MS";
const UO_CV: &str = "UO";

impl ControlledVocabulary {
    pub fn prefix(&self) -> Cow<'static, str> {
        match &self {
            Self::MS => Cow::Borrowed(MS_CV),
            Self::UO => Cow::Borrowed(UO_CV),
            Self::Unknown => Cow::Borrowed("?"),
        }
    }

    pub fn as_option(&self) -> Option<Self> {
        match self {
            Self::Unknown => None,
            _ => Some(*self),
        }
    }

    /// Create a term from this vocabulary with an accession number and a name
    pub fn const_param<S: Into<String>>(&self, name: S, accession: u32) -> Param {
        Param {
            name: name.into(),
            accession: Some(accession),
            controlled_vocabulary: Some(*self),
            ..Default::default()
        }
    }

    pub fn param_val<S: Into<String>, V: ToString>(
        &self,
        name: S,
        accession: u32,
        value: V,
    ) -> Param {
        let mut param = self.const_param(name, accession);
        param.value = value.to_string();
        param
    }
}

impl FromStr for ControlledVocabulary {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MS" | "PSI-MS" => Ok(Self::MS),
            "UO" => Ok(Self::UO),
            _ => Ok(Self::Unknown),
        }
    }
}

pub type ParamList = Vec<Param>;

pub trait ParamDescribed {
    fn params(&self) -> &ParamList;
    fn params_mut(&mut self) -> &mut ParamList;

    fn add_param(&mut self, param: Param) {
        self.params_mut().push(param);
    }

    fn get_param_by_name(&self, name: &str) -> Option<&Param> {
        self.params().iter().find(|param| param.name == name)
    }

    fn get_param_by_accession(&self, accession: &str) -> Option<&Param> {
        let (cv, acc_num) = curie_to_num(accession);
        self.params()
            .iter()
            .find(|param| param.accession == acc_num && param.controlled_vocabulary == cv)
    }

    /// Replace the value of the parameter named `name`, adding it if it is absent
    fn set_param(&mut self, param: Param) {
        match self.params_mut().iter_mut().find(|p| p.name == param.name) {
            Some(slot) => *slot = param,
            None => self.add_param(param),
        }
    }
}

#[macro_export]
macro_rules! impl_param_described {
    ($($t:ty), +) => {$(

        impl $crate::params::ParamDescribed for $t {
            fn params(&self) -> &$crate::params::ParamList {
                return &self.params
            }

            fn params_mut(&mut self) -> &mut $crate::params::ParamList {
                return &mut self.params
            }
        }
    )+};
}

/// Units that a term's value might have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Unit {
    MZ,
    Mass,
    PartsPerMillion,

    Minute,
    Second,

    DetectorCounts,

    #[default]
    Unknown,
}

impl Unit {
    pub fn for_param(&self) -> (&'static str, &'static str) {
        match self {
            Self::Second => ("UO:0000010", "second"),
            Self::Minute => ("UO:0000031", "minute"),
            Self::MZ => ("MS:1000040", "m/z"),
            Self::Mass => ("UO:0000221", "dalton"),
            Self::PartsPerMillion => ("UO:0000169", "parts per million"),
            Self::DetectorCounts => ("MS:1000131", "number of detector counts"),
            Self::Unknown => ("", ""),
        }
    }

    pub fn from_accession(acc: &str) -> Unit {
        match acc {
            "UO:0000010" => Self::Second,
            "UO:0000031" => Self::Minute,
            "MS:1000040" => Self::MZ,
            "UO:0000221" => Self::Mass,
            "UO:0000169" => Self::PartsPerMillion,
            "MS:1000131" => Self::DetectorCounts,
            _ => Unit::Unknown,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_curie_parsing() {
        let (cv, acc) = curie_to_num("MS:1000511");
        assert_eq!(cv, Some(ControlledVocabulary::MS));
        assert_eq!(acc, Some(1000511));

        let (cv, acc) = curie_to_num("FOO:bar");
        assert!(cv.is_none());
        assert!(acc.is_none());
    }

    #[test]
    fn test_set_param() {
        #[derive(Default)]
        struct Holder {
            params: ParamList,
        }
        impl_param_described!(Holder);

        let mut holder = Holder::default();
        holder.set_param(Param::new_key_value("title", "a"));
        holder.set_param(Param::new_key_value("title", "b"));
        assert_eq!(holder.params.len(), 1);
        assert_eq!(holder.get_param_by_name("title").unwrap().value, "b");

        holder.add_param(ControlledVocabulary::MS.param_val("ms level", 1000511, 2));
        let p = holder.get_param_by_accession("MS:1000511").unwrap();
        assert_eq!(p.coerce::<u8>().unwrap(), 2);
        assert_eq!(p.curie().unwrap(), "MS:1000511");
    }
}
