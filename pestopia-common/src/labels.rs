//! Pest class label table
//!
//! The order of [`PEST_CLASSES`] is the contract between the classifier weights
//! and the label text: index `i` of the model output is the score for
//! `PEST_CLASSES[i]`. Never sort or deduplicate this list.

use crate::{Error, Result};
use std::collections::HashSet;
use std::sync::Arc;

/// Number of classes the bundled classifier was trained on
pub const NUM_CLASSES: usize = 132;

/// Class names in model output order
pub const PEST_CLASSES: [&str; NUM_CLASSES] = [
    "Adristyrannus",
    "Aleurocanthus spiniferus",
    "Ampelophaga",
    "Aphis citricola Vander Goot",
    "Apolygus lucorum",
    "Bactrocera tsuneonis",
    "Beet spot flies",
    "Black hairy",
    "Brevipoalpus lewisi McGregor",
    "Ceroplastes rubens",
    "Chlumetia transversa",
    "Chrysomphalus aonidum",
    "Cicadella viridis",
    "Cicadellidae",
    "Colomerus vitis",
    "Dacus dorsalis(Hendel)",
    "Dasineura sp",
    "Deporaus marginatus Pascoe",
    "Erythroneura apicalis",
    "Field Cricket",
    "Fruit piercing moth",
    "Gall fly",
    "Icerya purchasi Maskell",
    "Indigo caterpillar",
    "Jute Stem Weevil",
    "Jute aphid",
    "Jute hairy",
    "Jute red mite",
    "Jute semilooper",
    "Jute stem girdler",
    "Jute stick insect",
    "Lawana imitata Melichar",
    "Leaf beetle",
    "Limacodidae",
    "Locust",
    "Locustoidea",
    "Lycorma delicatula",
    "Mango flat beak leafhopper",
    "Mealybug",
    "Miridae",
    "Nipaecoccus vastalor",
    "Panonchus citri McGregor",
    "Papilio xuthus",
    "Parlatoria zizyphus Lucus",
    "Phyllocnistis citrella Stainton",
    "Phyllocoptes oleiverus ashmead",
    "Pieris canidia",
    "Pod borer",
    "Polyphagotars onemus latus",
    "Potosiabre vitarsis",
    "Prodenia litura",
    "Pseudococcus comstocki Kuwana",
    "Rhytidodera bowrinii white",
    "Rice Stemfly",
    "Salurnis marginella Guerr",
    "Scirtothrips dorsalis Hood",
    "Spilosoma Obliqua",
    "Sternochetus frigidus",
    "Termite",
    "Termite odontotermes (Rambur)",
    "Tetradacus c Bactrocera minax",
    "Thrips",
    "Toxoptera aurantii",
    "Toxoptera citricidus",
    "Trialeurodes vaporariorum",
    "Unaspis yanonensis",
    "Viteus vitifoliae",
    "Xylotrechus",
    "Yellow Mite",
    "alfalfa plant bug",
    "alfalfa seed chalcid",
    "alfalfa weevil",
    "aphids",
    "army worm",
    "asiatic rice borer",
    "beet army worm",
    "beet fly",
    "beet weevil",
    "beetle",
    "bird cherry-oataphid",
    "black cutworm",
    "blister beetle",
    "bollworm",
    "brown plant hopper",
    "cabbage army worm",
    "cerodonta denticornis",
    "corn borer",
    "corn earworm",
    "cutworm",
    "english grain aphid",
    "fall armyworm",
    "flax budworm",
    "flea beetle",
    "grain spreader thrips",
    "grasshopper",
    "green bug",
    "grub",
    "large cutworm",
    "legume blister beetle",
    "longlegged spider mite",
    "lytta polita",
    "meadow moth",
    "mites",
    "mole cricket",
    "odontothrips loti",
    "oides decempunctata",
    "paddy stem maggot",
    "parathrene regalis",
    "peach borer",
    "penthaleus major",
    "red spider",
    "rice gall midge",
    "rice leaf caterpillar",
    "rice leaf roller",
    "rice leafhopper",
    "rice shell pest",
    "rice water weevil",
    "sawfly",
    "sericaorient alismots chulsky",
    "small brown plant hopper",
    "stem borer",
    "tarnished plant bug",
    "therioaphis maculata Buckton",
    "wheat blossom midge",
    "wheat phloeothrips",
    "wheat sawfly",
    "white backed plant hopper",
    "white margined moth",
    "whitefly",
    "wireworm",
    "yellow cutworm",
    "yellow rice borer",
];

/// Immutable, ordered class label sequence
///
/// Cheap to clone; all clones share the same backing slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabels {
    names: Arc<[String]>,
}

impl ClassLabels {
    /// Build a label sequence from explicit names
    ///
    /// Rejects empty sequences, blank names, and duplicates, since any of those
    /// would make the index to name mapping ambiguous.
    pub fn new(names: Vec<String>) -> Result<Self> {
        if names.is_empty() {
            return Err(Error::InvalidInput("label sequence is empty".to_string()));
        }

        let mut seen = HashSet::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(Error::InvalidInput(format!(
                    "label at index {} is blank",
                    index
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(Error::InvalidInput(format!(
                    "duplicate label '{}' at index {}",
                    name, index
                )));
            }
        }

        Ok(Self {
            names: names.into(),
        })
    }

    /// The bundled 132-class pest table
    pub fn pest_classes() -> Self {
        Self {
            names: PEST_CLASSES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Label for a model output index
    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }
}
