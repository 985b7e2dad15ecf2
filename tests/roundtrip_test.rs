//! Open -> save -> open fidelity, through memory, files and extracted directories.

mod common;

use common::{CORE_PROPERTIES, IMAGE, OFFICE_DOCUMENT, minimal_docx};
use opc_engine::ooxml::opc::constants::{content_type as ct, relationship_type as rt};
use opc_engine::ooxml::opc::{
    BlobPart, DirPhysReader, ImagePart, OpcPackage, OpenOptions, PackURI, Part, PartFactory,
    PhysPkgReader, XmlPart, ZipPhysReader,
};
use std::collections::BTreeMap;
use tempfile::TempDir;

fn uri(s: &str) -> PackURI {
    PackURI::new(s).unwrap()
}

fn blobs(pkg: &OpcPackage) -> BTreeMap<String, Vec<u8>> {
    pkg.iter_parts()
        .map(|part| (part.partname().to_string(), part.blob().to_vec()))
        .collect()
}

#[test]
fn test_round_trip_identity() {
    let mut pkg = OpcPackage::from_bytes(minimal_docx()).unwrap();
    let saved = pkg.save_to_bytes().unwrap();
    let reopened = OpcPackage::from_bytes(saved).unwrap();

    assert_eq!(reopened.part_count(), pkg.part_count());
    assert_eq!(reopened.rels().len(), pkg.rels().len());
    assert_eq!(
        reopened.main_document_part().unwrap().partname(),
        pkg.main_document_part().unwrap().partname()
    );
    assert_eq!(blobs(&reopened), blobs(&pkg));

    let targets = |pkg: &OpcPackage| -> Vec<(String, String, bool)> {
        pkg.iter_rels()
            .map(|r| (r.r_id().to_string(), r.target_ref().to_string(), r.is_external()))
            .collect()
    };
    assert_eq!(targets(&reopened), targets(&pkg));
}

#[test]
fn test_part_kinds_from_default_factory() {
    let pkg = OpcPackage::from_bytes(minimal_docx()).unwrap();

    let doc = pkg.main_document_part().unwrap();
    assert_eq!(doc.downcast_ref::<XmlPart>().unwrap().root_name(), "document");

    let image = pkg.part_by_name(&uri("/word/media/image1.png")).unwrap();
    let image = image.downcast_ref::<ImagePart>().unwrap();
    assert_eq!(image.filename(), "image1.png");
    assert_eq!(image.image_ext(), "png");

    let core = pkg.related_part(CORE_PROPERTIES).unwrap();
    assert!(core.downcast_ref::<XmlPart>().is_some());

    // An empty factory loads everything as opaque blobs.
    let mut phys_reader = ZipPhysReader::from_bytes(minimal_docx()).unwrap();
    let pkg = OpcPackage::from_phys_reader(&mut phys_reader, &PartFactory::new(), &OpenOptions::default())
        .unwrap();
    assert!(pkg.iter_parts().all(|part| part.downcast_ref::<BlobPart>().is_some()));
}

#[test]
fn test_external_relationship_round_trips() {
    let mut pkg = OpcPackage::from_bytes(minimal_docx()).unwrap();
    let ext = pkg.iter_rels().find(|rel| rel.is_external()).unwrap();
    assert_eq!(ext.target_ref(), "https://example.com/a?b=1&c=2");

    let reopened = OpcPackage::from_bytes(pkg.save_to_bytes().unwrap()).unwrap();
    let ext = reopened.iter_rels().find(|rel| rel.is_external()).unwrap();
    assert_eq!(ext.target_ref(), "https://example.com/a?b=1&c=2");
    assert_eq!(ext.reltype(), rt::HYPERLINK);
}

#[test]
fn test_added_image_is_saved() {
    let mut pkg = OpcPackage::from_bytes(minimal_docx()).unwrap();
    let doc = pkg.part_id(&uri("/word/document.xml")).unwrap();

    let partname = pkg.next_partname("/word/media/image%d.png").unwrap();
    assert_eq!(partname.as_str(), "/word/media/image2.png");

    let image = pkg
        .add_part(Box::new(ImagePart::load(partname.clone(), ct::PNG.to_string(), vec![7; 16])))
        .unwrap();
    let r_id = pkg.relate_part(doc, image, IMAGE).unwrap();
    assert_eq!(r_id, "rId4");
    assert_eq!(pkg.relate_part(doc, image, IMAGE).unwrap(), r_id);

    let reopened = OpcPackage::from_bytes(pkg.save_to_bytes().unwrap()).unwrap();
    assert_eq!(reopened.part_count(), 5);
    let saved = reopened.part_by_name(&partname).unwrap();
    assert_eq!(saved.blob(), &[7; 16][..]);
    assert_eq!(
        reopened.main_document_part().unwrap().rels().get("rId4").unwrap().target_ref(),
        "media/image2.png"
    );
    assert_eq!(reopened.next_partname("/word/media/image%d.png").unwrap().as_str(), "/word/media/image3.png");
}

#[test]
fn test_unrelated_added_part_is_not_saved() {
    let mut pkg = OpcPackage::from_bytes(minimal_docx()).unwrap();
    pkg.add_part(Box::new(BlobPart::new(uri("/loose.bin"), ct::OCTET_STREAM.to_string(), vec![1])))
        .unwrap();
    assert_eq!(pkg.part_count(), 5);

    let reopened = OpcPackage::from_bytes(pkg.save_to_bytes().unwrap()).unwrap();
    assert_eq!(reopened.part_count(), 4);
}

#[test]
fn test_modified_xml_part_is_saved() {
    let mut pkg = OpcPackage::from_bytes(minimal_docx()).unwrap();
    let doc = pkg.part_id(&uri("/word/document.xml")).unwrap();
    {
        let part = pkg.part_mut(doc).unwrap();
        let xml = part.downcast_mut::<XmlPart>().unwrap();
        assert!(xml.set_xml(b"<w:document><broken>".to_vec()).is_err());
        xml.set_xml(b"<w:document xmlns:w=\"urn:w\"><w:body><w:p/></w:body></w:document>".to_vec())
            .unwrap();
    }

    let reopened = OpcPackage::from_bytes(pkg.save_to_bytes().unwrap()).unwrap();
    let doc = reopened.main_document_part().unwrap();
    assert_eq!(doc.blob(), b"<w:document xmlns:w=\"urn:w\"><w:body><w:p/></w:body></w:document>");
}

#[test]
fn test_save_and_open_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("copy.docx");

    let mut pkg = OpcPackage::from_bytes(minimal_docx()).unwrap();
    pkg.save_to_file(&path).unwrap();

    let reopened = OpcPackage::open(&path).unwrap();
    assert_eq!(blobs(&reopened), blobs(&pkg));

    let phys_reader = ZipPhysReader::open(&path).unwrap();
    let mut members = phys_reader.member_names();
    members.sort();
    assert_eq!(
        members,
        [
            "[Content_Types].xml",
            "_rels/.rels",
            "docProps/core.xml",
            "word/_rels/document.xml.rels",
            "word/document.xml",
            "word/media/image1.png",
            "word/styles.xml",
        ]
    );
}

#[test]
fn test_open_extracted_directory() {
    let dir = TempDir::new().unwrap();
    let mut phys_reader = ZipPhysReader::from_bytes(minimal_docx()).unwrap();
    for member in phys_reader.member_names() {
        let blob = phys_reader.blob_for(&PackURI::from_membername(&member).unwrap()).unwrap();
        let path = dir.path().join(&member);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, blob).unwrap();
    }

    let from_dir = OpcPackage::open(dir.path()).unwrap();
    let from_zip = OpcPackage::from_bytes(minimal_docx()).unwrap();
    assert_eq!(blobs(&from_dir), blobs(&from_zip));

    let mut dir_reader = DirPhysReader::open(dir.path()).unwrap();
    assert!(dir_reader.rels_xml_for(&uri("/word/styles.xml")).unwrap().is_none());
}

#[test]
fn test_package_relationship_added_by_caller() {
    let mut pkg = OpcPackage::from_bytes(minimal_docx()).unwrap();
    let styles = pkg.part_id(&uri("/word/styles.xml")).unwrap();

    let r_id = pkg.relate_to(styles, OFFICE_DOCUMENT).unwrap();
    assert_eq!(r_id, "rId3");
    assert_eq!(pkg.relate_to(styles, OFFICE_DOCUMENT).unwrap(), r_id);
    assert_eq!(pkg.rels().len(), 3);

    // The first officeDocument relationship in order still wins.
    assert_eq!(pkg.main_document_part().unwrap().partname().as_str(), "/word/document.xml");
}

#[test]
fn test_drop_rel_respects_references() {
    let mut pkg = OpcPackage::from_bytes(minimal_docx()).unwrap();
    let doc = pkg.part_id(&uri("/word/document.xml")).unwrap();
    let part: &mut dyn Part = pkg.part_mut(doc).unwrap();

    assert_eq!(part.rel_ref_count("rId2"), 0);
    assert!(part.drop_rel("rId2"));
    assert!(part.rels().get("rId2").is_none());
    assert_eq!(part.target_ref("rId1").unwrap(), "styles.xml");
}
