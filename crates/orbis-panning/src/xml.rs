//! XML array format.
//!
//! ```xml
//! <panningConfiguration dimension="3" infinite="false">
//!   <outputEqConfiguration numberOfBiquads="1">
//!     <filterSpec name="shelf">
//!       <biquad b0="1.0" b1="0.0" b2="0.0" a1="0.0" a2="0.0"/>
//!     </filterSpec>
//!   </outputEqConfiguration>
//!   <loudspeaker id="1" channel="1" gainDB="-1.5" delay="0.001" eq="shelf">
//!     <cart x="1.0" y="0.0" z="0.0"/>
//!   </loudspeaker>
//!   <virtualspeaker id="4">
//!     <polar az="0" el="-90" r="1"/>
//!     <route lspId="1" gainDB="-4.77"/>
//!   </virtualspeaker>
//!   <subwoofer channel="5" assignedLoudspeakers="1,2,3" weights="0.5" gainDB="0"/>
//!   <triplet l1="1" l2="2" l3="3"/>
//! </panningConfiguration>
//! ```

use std::str::FromStr;

use nalgebra::Vector3;
use orbis_core::BiquadCoefficients;
use roxmltree::{Document, Node};

use crate::array::{ArrayBuilder, LoudspeakerArray, db_to_linear, spherical_to_cartesian};
use crate::error::{ArrayError, Result};

impl LoudspeakerArray {
    /// Parses the XML array format.
    pub fn from_xml_str(source: &str) -> Result<Self> {
        let doc = Document::parse(source)?;
        parse_root(doc.root_element())
    }
}

fn required<T: FromStr>(node: Node<'_, '_>, name: &str) -> Result<T> {
    let element = node.tag_name().name();
    let raw = node
        .attribute(name)
        .ok_or_else(|| ArrayError::structure(element, format!("missing attribute '{name}'")))?;
    raw.trim().parse().map_err(|_| {
        ArrayError::structure(element, format!("invalid value \"{raw}\" for '{name}'"))
    })
}

fn optional<T: FromStr>(node: Node<'_, '_>, name: &str, default: T) -> Result<T> {
    match node.attribute(name) {
        Some(_) => required(node, name),
        None => Ok(default),
    }
}

fn parse_bool(node: Node<'_, '_>, name: &str) -> Result<bool> {
    match node.attribute(name).map(str::trim) {
        None => Ok(false),
        Some("true" | "1") => Ok(true),
        Some("false" | "0") => Ok(false),
        Some(other) => Err(ArrayError::structure(
            node.tag_name().name(),
            format!("invalid boolean \"{other}\" for '{name}'"),
        )),
    }
}

fn parse_list<T: FromStr>(node: Node<'_, '_>, name: &str) -> Result<Vec<T>> {
    let element = node.tag_name().name();
    let raw = node
        .attribute(name)
        .ok_or_else(|| ArrayError::structure(element, format!("missing attribute '{name}'")))?;
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|_| {
                ArrayError::structure(element, format!("invalid list entry \"{s}\" in '{name}'"))
            })
        })
        .collect()
}

fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(Node::is_element)
}

fn position(node: Node<'_, '_>) -> Result<Vector3<f32>> {
    let element = node.tag_name().name();
    for child in elements(node) {
        match child.tag_name().name() {
            "cart" => {
                return Ok(Vector3::new(
                    required(child, "x")?,
                    required(child, "y")?,
                    required(child, "z")?,
                ));
            }
            "polar" => {
                return Ok(spherical_to_cartesian(
                    required(child, "az")?,
                    required(child, "el")?,
                    optional(child, "r", 1.0)?,
                ));
            }
            _ => {}
        }
    }
    Err(ArrayError::structure(element, "missing <cart> or <polar> position"))
}

fn parse_root(root: Node<'_, '_>) -> Result<LoudspeakerArray> {
    let mut builder = ArrayBuilder::default();
    let dimension: u32 = optional(root, "dimension", 3)?;
    match dimension {
        2 => builder.set_2d(true),
        3 => {}
        other => {
            return Err(ArrayError::structure(
                root.tag_name().name(),
                format!("dimension must be 2 or 3, found {other}"),
            ));
        }
    }
    builder.set_infinite(parse_bool(root, "infinite")?);

    for node in elements(root) {
        match node.tag_name().name() {
            "loudspeaker" => {
                builder.push_speaker(
                    required(node, "id")?,
                    Some(required(node, "channel")?),
                    position(node)?,
                );
                builder.adjust_last_speaker(
                    db_to_linear(optional(node, "gainDB", 0.0)?),
                    optional(node, "delay", 0.0)?,
                    node.attribute("eq").map(str::to_owned),
                );
            }
            "virtualspeaker" => {
                let id: usize = required(node, "id")?;
                builder.push_speaker(id, None, position(node)?);
                for route in elements(node).filter(|n| n.has_tag_name("route")) {
                    builder.push_route(
                        id,
                        required(route, "lspId")?,
                        db_to_linear(optional(route, "gainDB", 0.0)?),
                    );
                }
            }
            "subwoofer" => {
                let speakers = parse_list(node, "assignedLoudspeakers")?;
                let weights = match node.attribute("weights") {
                    Some(_) => parse_list(node, "weights")?,
                    None => vec![1.0],
                };
                builder.push_subwoofer(
                    required(node, "channel")?,
                    speakers,
                    weights,
                    db_to_linear(optional(node, "gainDB", 0.0)?),
                    optional(node, "delay", 0.0)?,
                    node.attribute("eq").map(str::to_owned),
                );
            }
            "triplet" => {
                let mut ids = vec![required(node, "l1")?, required(node, "l2")?];
                if let Some(l3) = node.attribute("l3").filter(|_| dimension == 3) {
                    ids.push(l3.trim().parse().map_err(|_| {
                        ArrayError::structure("triplet", format!("invalid value \"{l3}\" for 'l3'"))
                    })?);
                }
                builder.push_triplet(ids);
            }
            "outputEqConfiguration" => {
                if builder.has_eq_configuration() {
                    return Err(ArrayError::structure(
                        "outputEqConfiguration",
                        "only one equalisation configuration is allowed",
                    ));
                }
                builder.set_eq_sections(required(node, "numberOfBiquads")?);
                for spec in elements(node).filter(|n| n.has_tag_name("filterSpec")) {
                    let name: String = required(spec, "name")?;
                    let sections = elements(spec)
                        .filter(|n| n.has_tag_name("biquad"))
                        .map(|b| {
                            Ok(BiquadCoefficients::new(
                                required(b, "b0")?,
                                optional(b, "b1", 0.0)?,
                                optional(b, "b2", 0.0)?,
                                optional(b, "a1", 0.0)?,
                                optional(b, "a2", 0.0)?,
                            ))
                        })
                        .collect::<Result<Vec<_>>>()?;
                    builder.push_eq_filter(name, sections);
                }
            }
            other => {
                tracing::debug!(element = other, "ignoring unknown array element");
            }
        }
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    const OCTA_TOP: &str = r#"
<panningConfiguration dimension="3" infinite="false">
  <loudspeaker id="1" channel="1"><cart x="1" y="0" z="0"/></loudspeaker>
  <loudspeaker id="2" channel="2" gainDB="-6.0206" delay="0.002"><cart x="0" y="1" z="0"/></loudspeaker>
  <loudspeaker id="3" channel="3"><polar az="0" el="90" r="1"/></loudspeaker>
  <triplet l1="1" l2="2" l3="3"/>
</panningConfiguration>"#;

    #[test]
    fn parses_speakers_and_adjustments() {
        let array = LoudspeakerArray::from_xml_str(OCTA_TOP).unwrap();
        assert_eq!(array.number_of_speakers(), 3);
        assert_eq!(array.triplet(0).unwrap().0, [0, 1, 2]);
        let gains = array.gain_adjustment();
        assert!((gains[1] - 0.5).abs() < 1e-4);
        assert_eq!(array.delay_adjustment()[1], 0.002);
        assert!((array.position(2).unwrap().z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn virtual_speakers_routes_and_subwoofers() {
        let source = r#"
<panningConfiguration dimension="3" infinite="true">
  <loudspeaker id="1" channel="1"><cart x="1" y="0" z="0"/></loudspeaker>
  <loudspeaker id="2" channel="2"><cart x="0" y="1" z="0"/></loudspeaker>
  <loudspeaker id="3" channel="3"><cart x="0" y="0" z="1"/></loudspeaker>
  <virtualspeaker id="4">
    <cart x="0" y="0" z="-1"/>
    <route lspId="1" gainDB="0"/>
    <route lspId="2" gainDB="0"/>
  </virtualspeaker>
  <subwoofer channel="4" assignedLoudspeakers="1, 2 3" weights="0.25"/>
  <triplet l1="1" l2="2" l3="3"/>
  <triplet l1="1" l2="2" l3="4"/>
</panningConfiguration>"#;
        let array = LoudspeakerArray::from_xml_str(source).unwrap();
        assert!(array.is_infinite());
        assert_eq!(array.number_of_regular_speakers(), 3);
        assert_eq!(array.channel_index(3), None);
        assert_eq!(array.rerouting().row(0), &[1.0, 1.0, 0.0]);
        assert_eq!(array.subwoofer_gains().row(0), &[0.25, 0.25, 0.25]);
        assert_eq!(array.subwoofer_channels(), vec![3]);
    }

    #[test]
    fn output_eq_pads_with_identity() {
        let source = r#"
<panningConfiguration dimension="2">
  <outputEqConfiguration numberOfBiquads="2">
    <filterSpec name="tilt"><biquad b0="0.5" a1="-0.5"/></filterSpec>
  </outputEqConfiguration>
  <loudspeaker id="1" channel="1" eq="tilt"><cart x="1" y="0" z="0"/></loudspeaker>
  <loudspeaker id="2" channel="2"><cart x="0" y="1" z="0"/></loudspeaker>
  <triplet l1="1" l2="2" l3="99"/>
</panningConfiguration>"#;
        let array = LoudspeakerArray::from_xml_str(source).unwrap();
        assert!(array.is_2d());
        let eq = array.output_eq().unwrap();
        assert_eq!(eq.len(), 2);
        assert_eq!(eq[0][0], BiquadCoefficients::new(0.5, 0.0, 0.0, -0.5, 0.0));
        assert_eq!(eq[0][1], BiquadCoefficients::identity());
        assert_eq!(eq[1], vec![BiquadCoefficients::identity(); 2]);
    }

    #[test]
    fn structural_errors() {
        let err = LoudspeakerArray::from_xml_str("<a><loudspeaker id=\"1\"/></a>").unwrap_err();
        assert!(err.to_string().contains("'channel'"), "got: {err}");

        let err = LoudspeakerArray::from_xml_str("<a><loudspeaker").unwrap_err();
        assert!(matches!(err, ArrayError::Xml(_)));

        let unknown_eq = r#"<a><loudspeaker id="1" channel="1" eq="none"><cart x="1" y="0" z="0"/></loudspeaker>
<outputEqConfiguration numberOfBiquads="1"/></a>"#;
        let err = LoudspeakerArray::from_xml_str(unknown_eq).unwrap_err();
        assert!(matches!(err, ArrayError::UnknownEq(ref n) if n == "none"));

        let dup = r#"<a>
<loudspeaker id="1" channel="1"><cart x="1" y="0" z="0"/></loudspeaker>
<loudspeaker id="1" channel="2"><cart x="0" y="1" z="0"/></loudspeaker></a>"#;
        assert!(matches!(
            LoudspeakerArray::from_xml_str(dup),
            Err(ArrayError::DuplicateId(1))
        ));
    }
}
